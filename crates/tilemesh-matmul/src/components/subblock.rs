use tilemesh_common::SubblockShape;

/// Candidate subblocks, largest area first. Within an area, taller shapes come first.
pub const SUBBLOCK_CHOICES: [(u32, u32); 20] = [
    (4, 2),
    (2, 4),
    (8, 1),
    (1, 8),
    (7, 1),
    (1, 7),
    (3, 2),
    (2, 3),
    (6, 1),
    (1, 6),
    (5, 1),
    (1, 5),
    (2, 2),
    (4, 1),
    (1, 4),
    (3, 1),
    (1, 3),
    (2, 1),
    (1, 2),
    (1, 1),
];

/// Largest subblock area allowed when accumulating in 32-bit registers.
const WIDE_ACCUMULATOR_MAX_TILES: u32 = 4;

/// Pick the largest subblock evenly dividing a `block_h x block_w` block of output tiles.
///
/// A wide accumulator halves the destination registers, and a sharded output is written one
/// tile row at a time so its subblocks must be a single tile high. Falls back to `1x1`.
pub fn select_subblock(
    block_h: u32,
    block_w: u32,
    out_sharded: bool,
    fp32_dest_acc_en: bool,
) -> SubblockShape {
    SUBBLOCK_CHOICES
        .iter()
        .map(|&(h, w)| SubblockShape::new(h, w))
        .filter(|subblock| !fp32_dest_acc_en || subblock.tiles() <= WIDE_ACCUMULATOR_MAX_TILES)
        .filter(|subblock| !out_sharded || (subblock.h == 1 && block_w % subblock.w == 0))
        .find(|subblock| block_h % subblock.h == 0 && block_w % subblock.w == 0)
        .unwrap_or(SubblockShape::new(1, 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn square_blocks_prefer_the_largest_area() {
        assert_eq!(select_subblock(2, 2, false, false), SubblockShape::new(2, 2));
        assert_eq!(select_subblock(4, 4, false, false), SubblockShape::new(4, 2));
        assert_eq!(select_subblock(8, 8, false, false), SubblockShape::new(4, 2));
    }

    #[test]
    fn sharded_outputs_use_single_rows() {
        assert_eq!(select_subblock(8, 8, true, false), SubblockShape::new(1, 8));
        assert_eq!(select_subblock(4, 6, true, false), SubblockShape::new(1, 6));
        assert_eq!(select_subblock(4, 7, true, false), SubblockShape::new(1, 7));
    }

    #[test]
    fn wide_accumulator_limits_the_area() {
        assert_eq!(select_subblock(8, 8, false, true), SubblockShape::new(2, 2));
        assert_eq!(select_subblock(3, 1, false, true), SubblockShape::new(3, 1));
        assert_eq!(select_subblock(8, 8, true, true), SubblockShape::new(1, 4));
    }

    #[test]
    fn prime_blocks_fall_back_to_thin_subblocks() {
        assert_eq!(select_subblock(11, 13, false, false), SubblockShape::new(1, 1));
        assert_eq!(select_subblock(11, 2, false, false), SubblockShape::new(1, 2));
    }

    proptest! {
        #[test]
        fn selection_always_divides_the_block(
            block_h in 1u32..64,
            block_w in 1u32..64,
            out_sharded in any::<bool>(),
            wide in any::<bool>()
        ) {
            let subblock = select_subblock(block_h, block_w, out_sharded, wide);

            prop_assert!((1..=8).contains(&subblock.h));
            prop_assert!((1..=8).contains(&subblock.w));
            prop_assert_eq!(block_h % subblock.h, 0);
            prop_assert_eq!(block_w % subblock.w, 0);
            if wide {
                prop_assert!(subblock.tiles() <= 4);
            }
            if out_sharded {
                prop_assert_eq!(subblock.h, 1);
            }
        }
    }
}
