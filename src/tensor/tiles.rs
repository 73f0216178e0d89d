//! Tile geometry shared by every Winograd stage.
//!
//! Tile index is an implicit coordinate: the input transform, the
//! contraction and the output transform all walk tiles in the row-major
//! order defined here, so it must not change in one place only.

/// Side of a transformed (input-domain) tile.
pub const TILE_IN: usize = 8;

/// Side of the spatial output region one tile produces.
pub const TILE_OUT: usize = 6;

/// Winograd-domain coefficients per tile.
pub const COEFFS: usize = TILE_IN * TILE_IN;

/// Largest tile block the contraction processes at once.
pub const MAX_BLOCK: usize = 8;

/// Tiling of an output map into non-overlapping 6×6 regions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileGrid {
    tiles_x: usize,
    tiles_y: usize,
}

impl TileGrid {
    /// Grid covering a requested `width × height` output.
    pub fn for_output(width: usize, height: usize) -> Self {
        Self {
            tiles_x: width.div_ceil(TILE_OUT),
            tiles_y: height.div_ceil(TILE_OUT),
        }
    }

    pub fn tiles_x(&self) -> usize {
        self.tiles_x
    }

    pub fn tiles_y(&self) -> usize {
        self.tiles_y
    }

    pub fn tiles(&self) -> usize {
        self.tiles_x * self.tiles_y
    }

    /// Output width rounded up to a multiple of 6.
    pub fn padded_output_width(&self) -> usize {
        self.tiles_x * TILE_OUT
    }

    pub fn padded_output_height(&self) -> usize {
        self.tiles_y * TILE_OUT
    }

    /// Input width the transform reads: padded output width plus the 3×3 halo.
    pub fn padded_input_width(&self) -> usize {
        self.padded_output_width() + 2
    }

    pub fn padded_input_height(&self) -> usize {
        self.padded_output_height() + 2
    }

    /// Top-left `(y, x)` of a tile, in both the padded input and the padded output.
    pub fn origin(&self, tile: usize) -> (usize, usize) {
        ((tile / self.tiles_x) * TILE_OUT, (tile % self.tiles_x) * TILE_OUT)
    }

    /// Blocks of 8, 4, 2 and 1 tiles covering every tile in order.
    pub fn blocks(&self) -> TileBlocks {
        TileBlocks {
            next: 0,
            tiles: self.tiles(),
        }
    }
}

/// A run of consecutive tiles contracted together.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileBlock {
    pub start: usize,
    pub width: usize,
}

/// Greedy 8/4/2/1 schedule: full blocks of 8 first, then at most one of
/// each smaller width for the remainder.
#[derive(Clone, Debug)]
pub struct TileBlocks {
    next: usize,
    tiles: usize,
}

impl Iterator for TileBlocks {
    type Item = TileBlock;

    fn next(&mut self) -> Option<TileBlock> {
        let remaining = self.tiles - self.next;
        if remaining == 0 {
            return None;
        }
        let width = [MAX_BLOCK, 4, 2, 1]
            .into_iter()
            .find(|&w| w <= remaining)
            .unwrap_or(1);
        let block = TileBlock {
            start: self.next,
            width,
        };
        self.next += width;
        Some(block)
    }
}
