use super::logger::{LogLevel, LoggerConfig};
use tilemesh_common::{DataType, MathFidelity, MatrixShape};

/// The cases run by a benchmark sweep.
///
/// Every [entry](SweepEntry) is crossed with the shape table of its data type.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Skip shapes with a dimension larger than this.
    pub max_dim: Option<u32>,
    /// Where sweep progress and failures go.
    pub logger: LoggerConfig<SweepLogLevel>,
    /// Data type, fidelity and execution mode combinations.
    pub configs: Vec<SweepEntry>,
    /// Shapes benchmarked in [DataType::Bfloat16].
    pub bfloat16: Vec<ShapeEntry>,
    /// Shapes benchmarked in [DataType::Bfloat8B].
    pub bfloat8_b: Vec<ShapeEntry>,
    /// Shapes benchmarked in [DataType::Bfloat4B].
    pub bfloat4_b: Vec<ShapeEntry>,
}

/// One data type, fidelity and execution mode combination.
#[derive(new, Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SweepEntry {
    /// Element format of operands and output.
    pub dtype: DataType,
    /// Matrix engine fidelity.
    pub math_fidelity: MathFidelity,
    /// Replay a recorded trace instead of issuing every iteration.
    pub use_trace: bool,
}

/// One row of a shape table.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ShapeEntry {
    /// Rows of the output.
    pub m: u32,
    /// Reduction dimension.
    pub k: u32,
    /// Columns of the output.
    pub n: u32,
    /// Name of the multiply strategy.
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Block shard the first operand over the grid.
    pub in0_sharded: bool,
    /// Block shard the output over the grid.
    pub out_sharded: bool,
    /// Split of the first operand block along `K`.
    #[serde(default = "one")]
    pub in0_block_w_div: u32,
    /// Split of the output block along `M`.
    #[serde(default = "one")]
    pub num_out_blocks_h: u32,
    /// Split of the output block along `N`.
    #[serde(default = "one")]
    pub num_out_blocks_w: u32,
}

fn default_strategy() -> String {
    "ReuseMultiCast".to_string()
}

fn one() -> u32 {
    1
}

impl ShapeEntry {
    /// Logical shape of the matmul.
    pub fn shape(&self) -> MatrixShape {
        MatrixShape::new(self.m, self.k, self.n)
    }

    /// Largest of the three dimensions.
    pub fn max_dim(&self) -> u32 {
        self.m.max(self.k).max(self.n)
    }
}

/// Amount of sweep progress logged.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SweepLogLevel {
    /// Nothing is logged.
    #[serde(rename = "disabled")]
    Disabled,
    /// Failed and skipped cases.
    #[default]
    #[serde(rename = "basic")]
    Basic,
    /// Every case with its result.
    #[serde(rename = "full")]
    Full,
}

impl LogLevel for SweepLogLevel {
    fn is_disabled(&self) -> bool {
        matches!(self, SweepLogLevel::Disabled)
    }
}

impl SweepConfig {
    /// Shape table of a data type.
    pub fn shapes(&self, dtype: DataType) -> &[ShapeEntry] {
        match dtype {
            DataType::Bfloat16 => &self.bfloat16,
            DataType::Bfloat8B => &self.bfloat8_b,
            DataType::Bfloat4B => &self.bfloat4_b,
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        let configs = [
            (DataType::Bfloat16, MathFidelity::HiFi2, false),
            (DataType::Bfloat16, MathFidelity::HiFi4, false),
            (DataType::Bfloat8B, MathFidelity::HiFi2, false),
            (DataType::Bfloat8B, MathFidelity::LoFi, false),
            (DataType::Bfloat4B, MathFidelity::LoFi, false),
            (DataType::Bfloat16, MathFidelity::HiFi2, true),
            (DataType::Bfloat16, MathFidelity::HiFi4, true),
            (DataType::Bfloat8B, MathFidelity::HiFi2, true),
            (DataType::Bfloat8B, MathFidelity::LoFi, true),
            (DataType::Bfloat4B, MathFidelity::LoFi, true),
        ];

        let mut bfloat16 = Vec::new();
        for strategy in ["NonOptimized", "Reuse", "ReuseMultiCast", "Cannon"] {
            bfloat16.extend(table(SQUARE_SHAPES, strategy));
        }
        bfloat16.extend(table(BFLOAT16_SHAPES, "ReuseMultiCast"));

        Self {
            max_dim: Some(512),
            logger: LoggerConfig::default(),
            configs: configs
                .into_iter()
                .map(|(dtype, fidelity, trace)| SweepEntry::new(dtype, fidelity, trace))
                .collect(),
            bfloat16,
            bfloat8_b: table(BFLOAT8_B_SHAPES, "ReuseMultiCast"),
            bfloat4_b: table(BFLOAT4_B_SHAPES, "ReuseMultiCast"),
        }
    }
}

type Row = (u32, u32, u32, bool, bool, u32, u32, u32);

fn table(rows: &[Row], strategy: &str) -> Vec<ShapeEntry> {
    rows.iter()
        .map(|&(m, k, n, in0_sharded, out_sharded, div, blocks_h, blocks_w)| ShapeEntry {
            m,
            k,
            n,
            strategy: strategy.to_string(),
            in0_sharded,
            out_sharded,
            in0_block_w_div: div,
            num_out_blocks_h: blocks_h,
            num_out_blocks_w: blocks_w,
        })
        .collect()
}

// m, k, n, in0_sharded, out_sharded, in0_block_w_div, num_out_blocks_h, num_out_blocks_w
const SQUARE_SHAPES: &[Row] = &[
    (512, 512, 512, true, true, 1, 1, 1),
    (1024, 1024, 1024, true, true, 1, 1, 1),
    (2048, 2048, 2048, true, true, 1, 1, 1),
    (4096, 4096, 4096, false, false, 1, 2, 2),
    (8192, 8192, 8192, false, false, 2, 4, 4),
    (16384, 16384, 16384, false, false, 4, 8, 8),
];

const BFLOAT16_SHAPES: &[Row] = &[
    (512, 512, 512, true, true, 1, 1, 1),
    (512, 1024, 1024, true, true, 1, 1, 1),
    (512, 1024, 2048, true, true, 1, 1, 1),
    (1024, 1024, 1024, true, true, 1, 1, 1),
    (1024, 1024, 2048, true, true, 1, 1, 1),
    (1024, 2048, 2048, true, true, 1, 1, 1),
    (2048, 2048, 2048, true, true, 1, 1, 1),
    (2048, 2048, 3072, true, true, 1, 1, 1),
    (2048, 3072, 3072, true, true, 2, 1, 1),
    (3072, 3072, 3072, true, true, 4, 1, 1),
    (3072, 3072, 4096, false, false, 2, 1, 1),
    (3072, 4096, 4096, false, false, 2, 1, 1),
    (4096, 4096, 4096, false, false, 1, 2, 2),
    (8192, 8192, 8192, false, false, 2, 4, 4),
    (16384, 16384, 16384, false, false, 4, 8, 8),
];

const BFLOAT8_B_SHAPES: &[Row] = &[
    (512, 512, 512, true, true, 1, 1, 1),
    (512, 1024, 1024, true, true, 1, 1, 1),
    (512, 1024, 2048, true, true, 1, 1, 1),
    (1024, 1024, 1024, true, true, 1, 1, 1),
    (1024, 1024, 2048, true, true, 1, 1, 1),
    (1024, 2048, 2048, true, true, 1, 1, 1),
    (2048, 2048, 2048, true, true, 1, 1, 1),
    (2048, 2048, 3072, true, true, 1, 1, 1),
    (2048, 3072, 3072, true, true, 1, 1, 1),
    (3072, 3072, 3072, true, true, 2, 1, 1),
    (3072, 3072, 4096, true, true, 2, 1, 1),
    (3072, 4096, 4096, true, true, 1, 2, 2),
    (4096, 4096, 4096, false, false, 1, 2, 2),
    (8192, 8192, 8192, false, false, 2, 4, 4),
    (16384, 16384, 16384, false, false, 4, 8, 8),
];

const BFLOAT4_B_SHAPES: &[Row] = &[
    (512, 512, 512, true, true, 1, 1, 1),
    (512, 1024, 1024, true, true, 1, 1, 1),
    (512, 1024, 2048, true, true, 1, 1, 1),
    (1024, 1024, 1024, true, true, 1, 1, 1),
    (1024, 1024, 2048, true, true, 1, 1, 1),
    (1024, 2048, 2048, true, true, 1, 1, 1),
    (2048, 2048, 2048, true, true, 1, 1, 1),
    (2048, 2048, 3072, true, true, 1, 1, 1),
    (2048, 3072, 3072, true, true, 1, 1, 1),
    (3072, 3072, 3072, true, true, 1, 1, 1),
    (3072, 3072, 4096, true, true, 1, 1, 1),
    (3072, 4096, 4096, true, true, 2, 1, 1),
    (4096, 4096, 4096, true, true, 2, 1, 1),
    (8192, 8192, 8192, false, false, 2, 2, 2),
    (16384, 16384, 16384, false, false, 4, 4, 4),
];
