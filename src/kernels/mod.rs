//! Microkernels for the inner loop of the per-coefficient contraction.
//!
//! A microkernel contracts one tile block (1, 2, 4 or 8 tiles) for one
//! coefficient and one output lane group over every input channel. The
//! contraction driver packs the data and calls them block by block.
//!
//! Available kernels:
//! - `lane_kernel`: portable, [`F16x8`] lane arithmetic
//! - `kernel_f16c`: x86_64 AVX + F16C + FMA, bit-identical to the portable one

#[cfg(target_arch = "x86_64")]
pub mod kernel_f16c;
pub mod lane_kernel;

use crate::config::MicrokernelChoice;
use crate::tensor::{F16x8, LANES};

/// A microkernel resolved for the running CPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Microkernel {
    Portable,
    #[cfg(target_arch = "x86_64")]
    F16c,
}

impl Microkernel {
    /// Resolves a configured choice against the running CPU.
    pub fn select(choice: MicrokernelChoice) -> Self {
        match choice {
            MicrokernelChoice::Auto => Self::detect(),
            MicrokernelChoice::Portable => Self::Portable,
        }
    }

    /// Fastest kernel this CPU supports.
    pub fn detect() -> Self {
        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("avx")
                && is_x86_feature_detected!("f16c")
                && is_x86_feature_detected!("fma")
            {
                return Self::F16c;
            }
        }
        Self::Portable
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Portable => "portable",
            #[cfg(target_arch = "x86_64")]
            Self::F16c => "avx-f16c-fma",
        }
    }

    /// Contracts one block of `out.len()` tiles.
    ///
    /// `kernel` is the coefficient's `in_channels` weight vectors, `packed`
    /// the block's `[in_group][tile]` input.
    ///
    /// # Panics
    ///
    /// Panics if the block width is not 1, 2, 4 or 8, or if the slice
    /// lengths disagree.
    pub fn contract_block(self, kernel: &[F16x8], packed: &[F16x8], out: &mut [F16x8]) {
        let width = out.len();
        let in_groups = kernel.len() / LANES;
        assert_eq!(kernel.len(), in_groups * LANES);
        assert_eq!(packed.len(), in_groups * width);

        match self {
            Self::Portable => match width {
                8 => lane_kernel::contract_tiles::<8>(kernel, packed, out),
                4 => lane_kernel::contract_tiles::<4>(kernel, packed, out),
                2 => lane_kernel::contract_tiles::<2>(kernel, packed, out),
                1 => lane_kernel::contract_tiles::<1>(kernel, packed, out),
                _ => panic!("unsupported tile block width {width}"),
            },
            #[cfg(target_arch = "x86_64")]
            Self::F16c => {
                let (k, p, o) = (kernel.as_ptr(), packed.as_ptr(), out.as_mut_ptr());
                // SAFETY: F16c is only constructed after runtime detection of
                // avx, f16c and fma; lengths were checked above.
                unsafe {
                    match width {
                        8 => kernel_f16c::contract_tiles_f16c::<8>(k, p, o, in_groups),
                        4 => kernel_f16c::contract_tiles_f16c::<4>(k, p, o, in_groups),
                        2 => kernel_f16c::contract_tiles_f16c::<2>(k, p, o, in_groups),
                        1 => kernel_f16c::contract_tiles_f16c::<1>(k, p, o, in_groups),
                        _ => panic!("unsupported tile block width {width}"),
                    }
                }
            }
        }
    }
}
