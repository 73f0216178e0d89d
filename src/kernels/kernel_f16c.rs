//! AVX + F16C + FMA contraction microkernel.

use crate::tensor::{F16x8, LANES};

/// Contracts one tile block, `N` tiles wide, with 256-bit registers.
///
/// Same contract and same result bits as
/// [`contract_tiles`](super::lane_kernel::contract_tiles): accumulators live
/// in single precision but go through a half round trip after every fused
/// multiply-add, matching the portable kernel's per-step rounding.
///
/// # Safety
///
/// Caller must ensure:
/// - CPU supports AVX, F16C and FMA (checked via `#[target_feature]`)
/// - `kernel` points to `in_groups * 8` readable [`F16x8`] values
/// - `packed` points to `in_groups * N` readable [`F16x8`] values
/// - `out` points to `N` writable [`F16x8`] values
#[target_feature(enable = "avx,f16c,fma")]
#[allow(unsafe_op_in_unsafe_fn)]
pub unsafe fn contract_tiles_f16c<const N: usize>(
    kernel: *const F16x8,
    packed: *const F16x8,
    out: *mut F16x8,
    in_groups: usize,
) {
    use std::arch::x86_64::*;

    let mut acc = [_mm256_setzero_ps(); N];
    let mut inputs = [[0.0f32; LANES]; N];

    for q in 0..in_groups {
        for t in 0..N {
            let v = _mm256_cvtph_ps(_mm_loadu_si128(packed.add(q * N + t) as *const __m128i));
            _mm256_storeu_ps(inputs[t].as_mut_ptr(), v);
        }

        for l in 0..LANES {
            let k = _mm256_cvtph_ps(_mm_loadu_si128(kernel.add(q * LANES + l) as *const __m128i));
            for t in 0..N {
                let sum = _mm256_fmadd_ps(k, _mm256_set1_ps(inputs[t][l]), acc[t]);
                acc[t] = _mm256_cvtph_ps(_mm256_cvtps_ph(sum, _MM_FROUND_TO_NEAREST_INT));
            }
        }
    }

    for t in 0..N {
        let h = _mm256_cvtps_ph(acc[t], _MM_FROUND_TO_NEAREST_INT);
        _mm_storeu_si128(out.add(t) as *mut __m128i, h);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::lane_kernel::contract_tiles;

    fn lanes(seed: usize) -> F16x8 {
        F16x8::from_f32(std::array::from_fn(|l| {
            ((seed * 131 + l * 71) % 997) as f32 / 997.0 * 4.0 - 2.0
        }))
    }

    fn check_width<const N: usize>(in_groups: usize) {
        let kernel: Vec<F16x8> = (0..in_groups * LANES).map(lanes).collect();
        let packed: Vec<F16x8> = (0..in_groups * N).map(|i| lanes(i + 5000)).collect();

        let mut portable = [F16x8::ZERO; N];
        contract_tiles::<N>(&kernel, &packed, &mut portable);

        let mut fast = [F16x8::ZERO; N];
        unsafe {
            contract_tiles_f16c::<N>(kernel.as_ptr(), packed.as_ptr(), fast.as_mut_ptr(), in_groups);
        }

        for t in 0..N {
            for l in 0..LANES {
                assert_eq!(
                    fast[t].lane(l).to_bits(),
                    portable[t].lane(l).to_bits(),
                    "N={} tile {} lane {}: f16c={}, portable={}",
                    N,
                    t,
                    l,
                    fast[t].lane(l),
                    portable[t].lane(l)
                );
            }
        }
    }

    #[test]
    fn test_bit_identical_to_portable() {
        if !(is_x86_feature_detected!("avx")
            && is_x86_feature_detected!("f16c")
            && is_x86_feature_detected!("fma"))
        {
            println!("Skipping - F16C/FMA not available");
            return;
        }

        for in_groups in [1, 3, 8] {
            check_width::<1>(in_groups);
            check_width::<2>(in_groups);
            check_width::<4>(in_groups);
            check_width::<8>(in_groups);
        }
    }
}
