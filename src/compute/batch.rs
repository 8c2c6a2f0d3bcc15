//! Evaluation of many independent graph instances in parallel.
//!
//! A single graph is always evaluated on one thread. Throughput comes from
//! running separate instances, each owning its buffers, side by side.
use crate::graph::{DagError, FaoDag};
use crate::store::Direction;
use rayon::prelude::*;

fn eval_one(dag: &mut FaoDag, input: &[f64], direction: Direction) -> Result<Vec<f64>, DagError> {
    dag.copy_input(input, direction)?;
    dag.eval(direction)?;
    let len = match direction {
        Direction::Forward => dag.output_len(),
        Direction::Adjoint => dag.input_len(),
    };
    let mut out = vec![0.0; len];
    dag.copy_output(&mut out, direction)?;
    Ok(out)
}

pub type BatchResult = Result<Vec<Result<Vec<f64>, DagError>>, DagError>;

/// Evaluates `dags[i]` on `inputs[i]`.
///
/// Both slices must have the same length; otherwise nothing is evaluated.
/// A failing instance only fails its own entry.
pub fn eval_all(dags: &mut [FaoDag], inputs: &[Vec<f64>], direction: Direction) -> BatchResult {
    if dags.len() != inputs.len() {
        return Err(DagError::BatchSizeMismatch { instances: dags.len(), inputs: inputs.len() });
    }
    Ok(dags
        .par_iter_mut()
        .zip(inputs.par_iter())
        .map(|(dag, input)| eval_one(dag, input, direction))
        .collect())
}

pub fn forward_eval_all(dags: &mut [FaoDag], inputs: &[Vec<f64>]) -> BatchResult {
    eval_all(dags, inputs, Direction::Forward)
}

pub fn adjoint_eval_all(dags: &mut [FaoDag], inputs: &[Vec<f64>]) -> BatchResult {
    eval_all(dags, inputs, Direction::Adjoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::error::BufferRole;
    use crate::graph::{DagBuilder, Operator};
    use crate::store::Shape;

    fn scaled(alpha: f64) -> FaoDag {
        let mut b = DagBuilder::new();
        let s = b.add_node(Operator::ScalarMul { alpha }, vec![Shape::vector(3)], vec![Shape::vector(3)]);
        let c = b.add_node(Operator::Sum, vec![Shape::vector(3)], vec![Shape::vector(3)]);
        b.connect(s, c);
        b.build(s, c).unwrap()
    }

    #[test]
    fn test_instances_evaluate_independently() {
        let mut dags: Vec<FaoDag> = (1..=8).map(|k| scaled(k as f64)).collect();
        let inputs: Vec<Vec<f64>> = (0..8).map(|k| vec![1.0, k as f64, -1.0]).collect();

        let results = forward_eval_all(&mut dags, &inputs).unwrap();
        for (k, result) in results.into_iter().enumerate() {
            let alpha = (k + 1) as f64;
            assert_eq!(result.unwrap(), vec![alpha, alpha * k as f64, -alpha]);
        }
        assert!(dags.iter().all(|d| d.stats().forward.evals == 1));

        let back = adjoint_eval_all(&mut dags, &inputs).unwrap();
        assert_eq!(back.len(), 8);
        assert!(dags.iter().all(|d| d.stats().adjoint.evals == 1));
    }

    #[test]
    fn test_bad_input_only_fails_its_instance() {
        let mut dags = vec![scaled(2.0), scaled(3.0)];
        let inputs = vec![vec![1.0, 1.0, 1.0], vec![1.0]];
        let results = forward_eval_all(&mut dags, &inputs).unwrap();
        assert_eq!(results[0], Ok(vec![2.0, 2.0, 2.0]));
        assert_eq!(
            results[1],
            Err(DagError::LengthMismatch { role: BufferRole::ForwardInput, expected: 3, actual: 1 })
        );
    }

    #[test]
    fn test_unpaired_entries_rejected_before_evaluation() {
        let mut dags = vec![scaled(2.0), scaled(3.0)];
        let err = forward_eval_all(&mut dags, &[vec![1.0, 1.0, 1.0]]).unwrap_err();
        assert_eq!(err, DagError::BatchSizeMismatch { instances: 2, inputs: 1 });
        assert!(!err.is_configuration());
        assert!(dags.iter().all(|d| d.stats().forward.evals == 0));

        let err = adjoint_eval_all(&mut dags[..1], &[vec![0.0; 3], vec![0.0; 3]]).unwrap_err();
        assert_eq!(err, DagError::BatchSizeMismatch { instances: 1, inputs: 2 });
    }
}
