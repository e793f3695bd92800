// In: src/explain.rs

//! Renders an instruction pipeline as a result batch for `EXPLAIN`.

use crate::batch::Batch;
use crate::error::RingwireError;
use crate::instruction::Instruction;
use crate::types::{Type, TypeKind};
use crate::vector::Vector;

/// Name of the single output column.
pub const QUERY_PLAN: &str = "QUERY PLAN";

/// One varchar row per instruction, in pipeline order, each with weight 1.
///
/// An instruction whose argument does not belong to its opcode is rejected
/// rather than printed.
pub fn explain_pipeline(pipeline: &[Instruction]) -> Result<Batch, RingwireError> {
    let rows = pipeline
        .iter()
        .map(|ins| {
            ins.check()?;
            Ok(ins.to_string())
        })
        .collect::<Result<Vec<String>, RingwireError>>()?;

    let mut bat = Batch::default();
    bat.push_vector(
        QUERY_PLAN,
        Vector::from_byte_rows(Type::with_size(TypeKind::Varchar, Type::BYTES_SLOT_SIZE), &rows)?,
    );
    bat.zs = vec![1; rows.len()];
    log::debug!("explained pipeline of {} instructions", rows.len());
    Ok(bat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{Argument, Direction, OpCode, SortField};

    #[test]
    fn test_one_row_per_instruction() {
        let pipeline = vec![
            Instruction::from_argument(Argument::Top {
                limit: 5,
                fields: vec![SortField::new("a", Direction::Ascending)],
            }),
            Instruction::from_argument(Argument::Merge),
        ];
        let bat = explain_pipeline(&pipeline).unwrap();
        bat.validate().unwrap();

        assert_eq!(bat.attrs, vec![QUERY_PLAN.to_string()]);
        let plan = bat.vector_by_name(QUERY_PLAN).unwrap();
        assert_eq!(plan.typ().kind, TypeKind::Varchar);
        assert_eq!(plan.typ().size, 24);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.bytes_at(0).unwrap(), pipeline[0].to_string().as_bytes());
        assert_eq!(plan.bytes_at(1).unwrap(), b"merge");
        assert_eq!(bat.zs, vec![1, 1]);
    }

    #[test]
    fn test_empty_pipeline_gives_empty_plan() {
        let bat = explain_pipeline(&[]).unwrap();
        assert_eq!(bat.row_count(), 0);
        assert_eq!(bat.attrs.len(), 1);
    }

    #[test]
    fn test_mismatched_instruction_is_rejected() {
        let bad = Instruction {
            op: OpCode::Limit,
            arg: Argument::Merge,
        };
        assert!(explain_pipeline(&[bad]).is_err());
    }
}
