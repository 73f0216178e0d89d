use std::borrow::Cow;
use std::sync::Arc;

use half::f16;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use winograd63::blocked::{contract, interleave_tiles};
use winograd63::border::pad_input;
use winograd63::kernels::Microkernel;
use winograd63::transform::transform_input;
use winograd63::{
    ConvConfig, ConvOptions, FeatureMap, MicrokernelChoice, OutputShape, RecyclingAllocator,
    TileGrid, WinogradConv, conv3x3_direct, convolve, tolerance, transform_filter,
};

/// A convolution problem in planar single precision.
struct Case {
    input: Vec<f32>,
    in_width: usize,
    in_height: usize,
    in_channels: usize,
    weights: Vec<f32>,
    bias: Option<Vec<f32>>,
    out_channels: usize,
    out_width: usize,
    out_height: usize,
}

impl Case {
    /// Inputs in [-1, 1], weights scaled by 1/sqrt(9·in), bias in [-0.5, 0.5].
    fn random(in_channels: usize, out_channels: usize, out_width: usize, out_height: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let (in_width, in_height) = (out_width + 2, out_height + 2);
        let scale = 1.0 / (9.0 * in_channels as f32).sqrt();
        Self {
            input: (0..in_channels * in_width * in_height)
                .map(|_| rng.gen_range(-1.0..1.0))
                .collect(),
            in_width,
            in_height,
            in_channels,
            weights: (0..out_channels * in_channels * 9)
                .map(|_| rng.gen_range(-scale..scale))
                .collect(),
            bias: Some((0..out_channels).map(|_| rng.gen_range(-0.5..0.5)).collect()),
            out_channels,
            out_width,
            out_height,
        }
    }

    fn direct(&self) -> Vec<f32> {
        // the Winograd path sees the input and bias in half precision
        let input: Vec<f32> = self.input.iter().map(|&x| f16::from_f32(x).to_f32()).collect();
        let bias: Option<Vec<f32>> = self
            .bias
            .as_ref()
            .map(|b| b.iter().map(|&x| f16::from_f32(x).to_f32()).collect());
        conv3x3_direct(
            &input,
            self.in_width,
            self.in_height,
            self.in_channels,
            &self.weights,
            bias.as_deref(),
            self.out_channels,
            self.out_width,
            self.out_height,
        )
    }

    fn winograd(&self, options: &ConvOptions) -> FeatureMap {
        let input =
            FeatureMap::from_planar_f32(&self.input, self.in_width, self.in_height, self.in_channels)
                .unwrap();
        let filter = transform_filter(&self.weights, self.in_channels, self.out_channels, options).unwrap();
        let bias: Option<Vec<f16>> = self
            .bias
            .as_ref()
            .map(|b| b.iter().copied().map(f16::from_f32).collect());
        convolve(
            &input,
            &filter,
            bias.as_deref(),
            OutputShape::new(self.out_width, self.out_height),
            options,
        )
        .unwrap()
    }
}

/// Diagonal filter: output channel c convolves input channel c with `tap`.
fn diagonal_filter(channels: usize, tap: [f32; 9]) -> Vec<f32> {
    let mut weights = vec![0.0f32; channels * channels * 9];
    for c in 0..channels {
        weights[(c * channels + c) * 9..][..9].copy_from_slice(&tap);
    }
    weights
}

fn assert_close(expected: &[f32], actual: &[f32], in_channels: usize, name: &str) {
    assert_eq!(expected.len(), actual.len(), "{}: length mismatch", name);
    let scale = expected.iter().fold(1.0f32, |m, x| m.max(x.abs()));
    let limit = tolerance(in_channels) * scale;
    for i in 0..expected.len() {
        assert!(
            (expected[i] - actual[i]).abs() <= limit,
            "{}: mismatch at index {}: expected {}, got {} (tolerance {})",
            name,
            i,
            expected[i],
            actual[i],
            limit
        );
    }
}

fn parallel_options(threads: usize) -> ConvOptions {
    ConvOptions::from_config(&ConvConfig {
        num_threads: threads,
        adaptive_threads: false,
        ..ConvConfig::default()
    })
    .unwrap()
}

// ============================================================
// Reference scenarios
// ============================================================

#[test]
fn test_averaging_filter_on_ones() {
    let options = ConvOptions::single_threaded();
    let input = FeatureMap::from_planar_f32(&[1.0; 8 * 8 * 8], 8, 8, 8).unwrap();
    let filter = transform_filter(&diagonal_filter(8, [1.0 / 9.0; 9]), 8, 8, &options).unwrap();

    let out = convolve(&input, &filter, None, OutputShape::new(6, 6), &options).unwrap();

    assert_eq!((out.width(), out.height(), out.channels()), (6, 6, 8));
    for x in out.to_planar_f32() {
        assert!((x - 1.0).abs() < 1e-2, "expected ~1.0, got {}", x);
    }
}

#[test]
fn test_all_taps_averaging_sums_channels() {
    // every output channel averages all 8 input channels' windows
    let options = ConvOptions::single_threaded();
    let input = FeatureMap::from_planar_f32(&[1.0; 8 * 8 * 8], 8, 8, 8).unwrap();
    let filter = transform_filter(&[1.0 / 9.0; 8 * 8 * 9], 8, 8, &options).unwrap();

    let out = convolve(&input, &filter, None, OutputShape::new(6, 6), &options).unwrap();
    for x in out.to_planar_f32() {
        assert!((x - 8.0).abs() < 0.1, "expected ~8.0, got {}", x);
    }
}

#[test]
fn test_single_pixel() {
    let options = ConvOptions::single_threaded();
    let input = FeatureMap::from_planar_f32(&[3.0; 8], 1, 1, 8).unwrap();
    let mut tap = [0.0; 9];
    tap[0] = 1.0;
    let filter = transform_filter(&diagonal_filter(8, tap), 8, 8, &options).unwrap();

    let out = convolve(&input, &filter, None, OutputShape::new(1, 1), &options).unwrap();

    assert_eq!((out.width(), out.height()), (1, 1));
    for x in out.to_planar_f32() {
        assert!((x - 3.0).abs() < 0.03, "expected ~3.0, got {}", x);
    }
}

#[test]
fn test_sobel_on_ramp() {
    // pixel value = column; Sobel-x gives -8, plus bias 0.5
    let options = ConvOptions::single_threaded();
    let ramp: Vec<f32> = (0..8 * 9).map(|i| (i % 3) as f32).collect();
    let input = FeatureMap::from_planar_f32(&ramp, 3, 3, 8).unwrap();
    let sobel = [1.0, 0.0, -1.0, 2.0, 0.0, -2.0, 1.0, 0.0, -1.0];
    let filter = transform_filter(&diagonal_filter(8, sobel), 8, 8, &options).unwrap();
    let bias = [f16::from_f32(0.5); 8];

    let out = convolve(&input, &filter, Some(&bias[..]), OutputShape::new(1, 1), &options).unwrap();

    let expected = conv3x3_direct(&ramp, 3, 3, 8, &diagonal_filter(8, sobel), Some(&[0.5; 8][..]), 8, 1, 1);
    assert_eq!(expected, vec![-7.5; 8]);
    assert_close(&expected, &out.to_planar_f32(), 8, "sobel");
}

// ============================================================
// Shape and layout laws
// ============================================================

#[test]
fn test_shape_law_around_multiples_of_six() {
    let options = ConvOptions::single_threaded();
    let sizes = [(1, 1), (5, 7), (6, 6), (7, 5), (11, 13), (12, 12), (13, 6)];

    for (i, &(w, h)) in sizes.iter().enumerate() {
        let case = Case::random(8, 16, w, h, i as u64);
        let out = case.winograd(&options);

        assert_eq!((out.width(), out.height(), out.channels()), (w, h, 16), "{}x{}", w, h);
        assert_close(&case.direct(), &out.to_planar_f32(), 8, &format!("{}x{}", w, h));
    }
}

#[test]
fn test_multiple_input_groups() {
    let case = Case::random(24, 8, 10, 9, 99);
    let out = case.winograd(&ConvOptions::single_threaded());
    assert_close(&case.direct(), &out.to_planar_f32(), 24, "24->8");
}

#[test]
fn test_wide_layers_stay_within_tolerance() {
    let options = parallel_options(4);
    for (i, &in_channels) in [64, 128, 256].iter().enumerate() {
        for seed in 0..2 {
            let case = Case::random(in_channels, 8, 20, 20, 100 * i as u64 + seed);
            let out = case.winograd(&options);
            assert_close(
                &case.direct(),
                &out.to_planar_f32(),
                in_channels,
                &format!("{}->8 seed {}", in_channels, seed),
            );
        }
    }
}

#[test]
fn test_doubled_input_range_stays_within_tolerance() {
    let mut case = Case::random(64, 16, 24, 20, 31);
    case.input.iter_mut().for_each(|x| *x *= 2.0);
    let out = case.winograd(&parallel_options(4));
    assert_close(&case.direct(), &out.to_planar_f32(), 64, "64->16 in [-2, 2]");
}

#[test]
fn test_oversized_input_ignores_extra_pixels() {
    let options = ConvOptions::single_threaded();
    let mut case = Case::random(8, 8, 6, 6, 5);
    let trimmed = case.winograd(&options);

    // grow the input by 4 columns and rows of noise beyond the padded extent
    let (w, h) = (case.in_width + 4, case.in_height + 4);
    let mut big = vec![9.0f32; 8 * w * h];
    for c in 0..8 {
        for y in 0..case.in_height {
            for x in 0..case.in_width {
                big[(c * h + y) * w + x] = case.input[(c * case.in_height + y) * case.in_width + x];
            }
        }
    }
    case.input = big;
    case.in_width = w;
    case.in_height = h;

    assert_eq!(case.winograd(&options), trimmed);
}

#[test]
fn test_zero_bias_law() {
    let options = ConvOptions::single_threaded();
    let mut case = Case::random(8, 16, 9, 8, 11);
    case.bias = None;
    let without = case.winograd(&options);
    case.bias = Some(vec![0.0; 16]);
    let with_zero = case.winograd(&options);

    assert_eq!(without, with_zero);
}

#[test]
fn test_padding_idempotence() {
    let options = ConvOptions::single_threaded();
    let grid = TileGrid::for_output(10, 10);
    let data: Vec<f32> = (0..8 * 10 * 10).map(|i| (i % 7) as f32 - 3.0).collect();
    let input = FeatureMap::from_planar_f32(&data, 10, 10, 8).unwrap();

    let padded = pad_input(&input, &grid, &options).unwrap();
    assert_eq!((padded.width(), padded.height()), (14, 14));

    let again = pad_input(&padded, &grid, &options).unwrap();
    assert!(matches!(again, Cow::Borrowed(_)));
    assert_eq!(*again, *padded);

    // convolving the pre-padded map gives the same bits
    let weights: Vec<f32> = (0..8 * 8 * 9).map(|i| ((i % 11) as f32 - 5.0) / 40.0).collect();
    let filter = transform_filter(&weights, 8, 8, &options).unwrap();
    let a = convolve(&input, &filter, None, OutputShape::new(10, 10), &options).unwrap();
    let b = convolve(&padded, &filter, None, OutputShape::new(10, 10), &options).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_tile_count_agrees_across_stages() {
    let options = ConvOptions::single_threaded();
    let grid = TileGrid::for_output(10, 10);
    assert_eq!((grid.padded_output_width(), grid.padded_output_height()), (12, 12));
    assert_eq!(grid.tiles(), 4);

    let input = FeatureMap::zeros(12, 12, 16).unwrap();
    let filter = transform_filter(&vec![0.1; 8 * 16 * 9], 16, 8, &options).unwrap();
    let padded = pad_input(&input, &grid, &options).unwrap();

    let transformed = transform_input(&padded, &grid, &options).unwrap();
    assert_eq!(transformed.len(), 2 * 64 * 4);
    let packed = interleave_tiles(&transformed, &grid, 2, &options).unwrap();
    assert_eq!(packed.len(), 2 * 64 * 4);
    let product = contract(&packed, &filter, &grid, Microkernel::Portable, &options).unwrap();
    assert_eq!(product.len(), 64 * 4);
}

// ============================================================
// Execution invariance
// ============================================================

#[test]
fn test_thread_count_does_not_change_bits() {
    let case = Case::random(16, 16, 20, 17, 3);
    let expected = case.winograd(&ConvOptions::single_threaded());

    for threads in [2, 3, 4] {
        assert_eq!(case.winograd(&parallel_options(threads)), expected, "threads={}", threads);
    }
}

#[test]
fn test_portable_and_detected_kernels_agree() {
    let case = Case::random(16, 8, 25, 7, 21);
    let portable = ConvOptions::single_threaded().with_microkernel(MicrokernelChoice::Portable);
    let auto = ConvOptions::single_threaded().with_microkernel(MicrokernelChoice::Auto);

    println!("detected kernel: {}", Microkernel::detect().name());
    assert_eq!(case.winograd(&portable), case.winograd(&auto));
}

#[test]
fn test_recycling_allocator_reuses_scratch() {
    let allocator = Arc::new(RecyclingAllocator::default());
    let options = ConvOptions::single_threaded().with_allocator(allocator.clone());
    let case = Case::random(8, 8, 7, 7, 8);

    let first = case.winograd(&options);
    let cached = allocator.cached();
    assert!(cached > 0);

    let second = case.winograd(&options);
    assert_eq!(first, second);
    assert_eq!(allocator.cached(), cached);
}

#[test]
fn test_layer_matches_free_function() {
    let options = parallel_options(2);
    let case = Case::random(8, 16, 12, 6, 17);
    let layer = WinogradConv::new(
        &case.weights,
        8,
        16,
        case.bias.as_deref(),
        &options,
    )
    .unwrap();
    let input = FeatureMap::from_planar_f32(&case.input, case.in_width, case.in_height, 8).unwrap();

    let out = layer.forward(&input, OutputShape::new(12, 6), &options).unwrap();
    assert_eq!(out, case.winograd(&options));
}
