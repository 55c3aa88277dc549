use core::ops::Range;
use tilemesh_common::{
    CannonConfig, K_TILE, MatrixShape, ProgramConfig, SubblockShape, TileCounts, TileShape,
};

use crate::MatmulDescriptor;

/// Row-major operands of one matmul.
struct Operands<'a> {
    lhs: &'a [f32],
    rhs: &'a [f32],
    k: usize,
    n: usize,
}

/// Per-core decomposition shared by the reuse programs, in tiles.
struct BlockLayout {
    per_core_m: usize,
    per_core_n: usize,
    out_block_h: usize,
    out_block_w: usize,
    in0_block_w: usize,
    subblock: SubblockShape,
}

/// Compute `lhs @ rhs` following the decomposition of the descriptor's program.
///
/// The program must have been validated against the shape: every split is assumed exact.
pub(crate) fn matmul(
    lhs: &[f32],
    rhs: &[f32],
    shape: MatrixShape,
    descriptor: &MatmulDescriptor,
) -> Vec<f32> {
    let (m, k, n) = (shape.m as usize, shape.k as usize, shape.n as usize);
    let operands = Operands { lhs, rhs, k, n };
    let mut out = vec![0.0; m * n];
    let counts = TileCounts::of(&shape, &descriptor.tile);
    let tile = descriptor.tile;

    match &descriptor.program {
        ProgramConfig::NonOptimized => accumulate(&mut out, &operands, 0..m, 0..n, 0..k),
        ProgramConfig::Reuse(config) => {
            let layout = BlockLayout {
                per_core_m: config.per_core_m as usize,
                per_core_n: config.per_core_n as usize,
                out_block_h: config.per_core_m as usize,
                out_block_w: config.per_core_n as usize,
                in0_block_w: config.in0_block_w as usize,
                subblock: config.subblock,
            };
            blocked(&mut out, &operands, &counts, &tile, &layout);
        }
        ProgramConfig::ReuseMultiCast(config) => {
            let layout = BlockLayout {
                per_core_m: config.per_core_m as usize,
                per_core_n: config.per_core_n as usize,
                out_block_h: config.out_block_h as usize,
                out_block_w: config.out_block_w as usize,
                in0_block_w: config.in0_block_w as usize,
                subblock: config.subblock,
            };
            blocked(&mut out, &operands, &counts, &tile, &layout);

            if let Some(activation) = config.fused_activation {
                out.iter_mut()
                    .for_each(|value| *value = activation.apply(*value));
            }
        }
        ProgramConfig::Cannon(config) => cannon(&mut out, &operands, &counts, &tile, config),
    }

    descriptor.dtype.quantize(&mut out);
    out
}

/// `out[rows, cols] += lhs[rows, ks] @ rhs[ks, cols]`, in elements.
fn accumulate(
    out: &mut [f32],
    operands: &Operands<'_>,
    rows: Range<usize>,
    cols: Range<usize>,
    ks: Range<usize>,
) {
    let (k, n) = (operands.k, operands.n);

    for row in rows {
        let out_row = &mut out[row * n + cols.start..row * n + cols.end];

        for kk in ks.clone() {
            let a = operands.lhs[row * k + kk];
            let rhs_row = &operands.rhs[kk * n + cols.start..kk * n + cols.end];

            for (acc, b) in out_row.iter_mut().zip(rhs_row) {
                *acc += a * b;
            }
        }
    }
}

/// Accumulate every subblock of an output block, with `row0` and `col0` its first tile.
fn subblocks(
    out: &mut [f32],
    operands: &Operands<'_>,
    tile: &TileShape,
    subblock: &SubblockShape,
    (row0, col0): (usize, usize),
    (block_h, block_w): (usize, usize),
    ks: Range<usize>,
) {
    let (th, tw) = (tile.h as usize, tile.w as usize);
    let (sh, sw) = (subblock.h as usize, subblock.w as usize);

    for sub_y in 0..block_h / sh {
        for sub_x in 0..block_w / sw {
            let row = row0 + sub_y * sh;
            let col = col0 + sub_x * sw;

            accumulate(
                out,
                operands,
                row * th..(row + sh) * th,
                col * tw..(col + sw) * tw,
                ks.clone(),
            );
        }
    }
}

fn blocked(
    out: &mut [f32],
    operands: &Operands<'_>,
    counts: &TileCounts,
    tile: &TileShape,
    layout: &BlockLayout,
) {
    let kt = counts.kt as usize;
    let cores_y = counts.mt as usize / layout.per_core_m;
    let cores_x = counts.nt as usize / layout.per_core_n;
    let blocks_y = layout.per_core_m / layout.out_block_h;
    let blocks_x = layout.per_core_n / layout.out_block_w;
    let tk = K_TILE as usize;

    for core_y in 0..cores_y {
        for core_x in 0..cores_x {
            for block_y in 0..blocks_y {
                for block_x in 0..blocks_x {
                    let row0 = core_y * layout.per_core_m + block_y * layout.out_block_h;
                    let col0 = core_x * layout.per_core_n + block_x * layout.out_block_w;

                    for k0 in (0..kt).step_by(layout.in0_block_w) {
                        subblocks(
                            out,
                            operands,
                            tile,
                            &layout.subblock,
                            (row0, col0),
                            (layout.out_block_h, layout.out_block_w),
                            k0 * tk..(k0 + layout.in0_block_w) * tk,
                        );
                    }
                }
            }
        }
    }
}

/// Each core starts on a different `K` block and moves to the next one at every step, as if its
/// operand blocks were shifted left and up along the grid.
fn cannon(
    out: &mut [f32],
    operands: &Operands<'_>,
    counts: &TileCounts,
    tile: &TileShape,
    config: &CannonConfig,
) {
    let (pcm, pcn, pck) = (
        config.per_core_m as usize,
        config.per_core_n as usize,
        config.per_core_k as usize,
    );
    let cores_y = counts.mt as usize / pcm;
    let cores_x = counts.nt as usize / pcn;
    let steps = counts.kt as usize / pck;
    let tk = K_TILE as usize;

    for step in 0..steps {
        for core_y in 0..cores_y {
            for core_x in 0..cores_x {
                let kb = (core_y + core_x + step) % steps;

                subblocks(
                    out,
                    operands,
                    tile,
                    &config.subblock,
                    (core_y * pcm, core_x * pcn),
                    (pcm, pcn),
                    kb * pck * tk..(kb + 1) * pck * tk,
                );
            }
        }
    }
}
