//! The closed set of atomic linear operators a node can carry.
//!
//! Each operator only ever sees its own node's buffers: the concatenated input
//! ports and the concatenated output ports. Matrices are stored and exchanged
//! in column-major order.
use crate::compute::kernel;
use crate::store::Shape;
use serde::{Deserialize, Serialize};

/// Port shapes of the node an operator runs on, in edge order.
#[derive(Debug, Clone, Copy)]
pub struct Ports<'a> {
    pub inputs: &'a [Shape],
    pub outputs: &'a [Shape],
}

impl Ports<'_> {
    pub fn input_len(&self) -> usize { self.inputs.iter().map(Shape::elem_len).sum() }
    pub fn output_len(&self) -> usize { self.outputs.iter().map(Shape::elem_len).sum() }
}

/// Local transform contract of one node.
///
/// `forward` overwrites every element of `output`; `adjoint` overwrites every
/// element of `input`. Buffers are reused across evaluations, so neither may
/// accumulate into stale contents.
pub trait LinearOp {
    fn forward(&self, ports: Ports<'_>, input: &[f64], output: &mut [f64]);
    fn adjoint(&self, ports: Ports<'_>, output: &[f64], input: &mut [f64]);
    /// Rejects port shapes this operator cannot be evaluated on.
    fn check_shapes(&self, ports: Ports<'_>) -> Result<(), String>;
}

/// Column-major dense matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseMatrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl DenseMatrix {
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        Self { rows, cols, data }
    }

    /// Builds from row slices, the natural way to write a matrix literal.
    ///
    /// Fails if the rows are ragged.
    pub fn from_rows(rows: &[&[f64]]) -> Result<Self, String> {
        let m = rows.len();
        let n = rows.first().map_or(0, |r| r.len());
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n) {
            return Err(format!("row {} has {} entries, expected {}", i, row.len(), n));
        }
        let mut data = vec![0.0; m * n];
        for (i, row) in rows.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                data[i + j * m] = *v;
            }
        }
        Ok(Self { rows: m, cols: n, data })
    }

    #[inline(always)]
    fn column(&self, j: usize) -> &[f64] {
        &self.data[j * self.rows..(j + 1) * self.rows]
    }
}

/// Compressed sparse row matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsrMatrix {
    pub rows: usize,
    pub cols: usize,
    pub indptr: Vec<usize>,
    pub indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl CsrMatrix {
    /// Builds from `(row, col, value)` triplets. Duplicates are kept and summed
    /// implicitly by the products.
    pub fn from_triplets(rows: usize, cols: usize, triplets: &[(usize, usize, f64)]) -> Self {
        let mut sorted = triplets.to_vec();
        sorted.sort_by_key(|&(r, c, _)| (r, c));
        let mut indptr = vec![0; rows + 1];
        for &(r, _, _) in &sorted {
            if r < rows {
                indptr[r + 1] += 1;
            }
        }
        for r in 0..rows {
            indptr[r + 1] += indptr[r];
        }
        let (indices, values) = sorted.iter().filter(|t| t.0 < rows).map(|&(_, c, v)| (c, v)).unzip();
        Self { rows, cols, indptr, indices, values }
    }

    fn validate(&self) -> Result<(), String> {
        if Some(self.indptr.len()) != self.rows.checked_add(1) {
            return Err(format!("indptr has {} entries for {} rows", self.indptr.len(), self.rows));
        }
        if self.indptr.windows(2).any(|w| w[0] > w[1]) {
            return Err("indptr is not monotone".into());
        }
        let nnz = self.indptr.last().copied().unwrap_or(0);
        if self.indices.len() != nnz || self.values.len() != nnz {
            return Err(format!(
                "expected {} stored entries, found {} indices and {} values",
                nnz,
                self.indices.len(),
                self.values.len()
            ));
        }
        if let Some(&c) = self.indices.iter().find(|&&c| c >= self.cols) {
            return Err(format!("column index {} out of range for {} columns", c, self.cols));
        }
        Ok(())
    }

    #[inline(always)]
    fn row(&self, r: usize) -> (&[usize], &[f64]) {
        let span = self.indptr[r]..self.indptr[r + 1];
        (&self.indices[span.clone()], &self.values[span])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operator {
    /// Identity. Also used to reinterpret a buffer under a different shape.
    NoOp,
    Neg,
    ScalarMul { alpha: f64 },
    /// `Y = A X` for `X` of shape `cols × k`.
    DenseMatMul { matrix: DenseMatrix },
    SparseMatMul { matrix: CsrMatrix },
    /// Elementwise sum of all inputs.
    Sum,
    /// Fan-out: every output receives the input.
    Copy,
    /// Inputs laid end to end. Covers vector concatenation and hstack.
    Concat,
    /// Inverse of `Concat`.
    Split,
    /// Row-stacks column-major blocks sharing a column count.
    Vstack,
    /// `y[i] = x[start + i * step]`.
    Index { start: usize, step: usize },
    Transpose,
    /// Vector to square diagonal matrix.
    DiagVec,
    /// Diagonal of a square matrix.
    DiagMat,
    /// Full 1-D convolution with a fixed kernel.
    Conv { kernel: Vec<f64> },
}

impl Operator {
    pub fn name(&self) -> &'static str {
        match self {
            Operator::NoOp => "no_op",
            Operator::Neg => "neg",
            Operator::ScalarMul { .. } => "scalar_mul",
            Operator::DenseMatMul { .. } => "dense_mat_mul",
            Operator::SparseMatMul { .. } => "sparse_mat_mul",
            Operator::Sum => "sum",
            Operator::Copy => "copy",
            Operator::Concat => "concat",
            Operator::Split => "split",
            Operator::Vstack => "vstack",
            Operator::Index { .. } => "index",
            Operator::Transpose => "transpose",
            Operator::DiagVec => "diag_vec",
            Operator::DiagMat => "diag_mat",
            Operator::Conv { .. } => "conv",
        }
    }
}

fn segments<'a>(buf: &'a [f64], shapes: &[Shape]) -> Vec<&'a [f64]> {
    let mut rest = buf;
    shapes
        .iter()
        .map(|s| {
            let (head, tail) = rest.split_at(s.elem_len());
            rest = tail;
            head
        })
        .collect()
}

fn segments_mut<'a>(buf: &'a mut [f64], shapes: &[Shape]) -> Vec<&'a mut [f64]> {
    let mut rest = buf;
    let mut out = Vec::with_capacity(shapes.len());
    for s in shapes {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(s.elem_len());
        out.push(head);
        rest = tail;
    }
    out
}

fn expect_ports(ports: Ports<'_>, inputs: Option<usize>, outputs: Option<usize>) -> Result<(), String> {
    let check = |side: &str, got: usize, want: Option<usize>| match want {
        Some(n) if got != n => Err(format!("expected {} {} port(s), found {}", n, side, got)),
        None if got == 0 => Err(format!("expected at least one {} port", side)),
        _ => Ok(()),
    };
    check("input", ports.inputs.len(), inputs)?;
    check("output", ports.outputs.len(), outputs)
}

fn same_len(a: usize, b: usize, what: &str) -> Result<(), String> {
    if a == b { Ok(()) } else { Err(format!("{}: {} != {}", what, a, b)) }
}

/// Size arithmetic on declared dimensions, failing instead of wrapping.
fn checked(value: Option<usize>, what: &str) -> Result<usize, String> {
    value.ok_or_else(|| format!("{} overflows", what))
}

/// Splits the single input of a matrix product into `k` right-hand columns.
fn product_columns(cols: usize, rows: usize, ports: Ports<'_>) -> Result<usize, String> {
    let in_len = ports.inputs[0].elem_len();
    if rows == 0 {
        return Err("matrix has no rows".into());
    }
    if cols == 0 || in_len % cols != 0 {
        return Err(format!("input of {} elements is not a multiple of {} matrix columns", in_len, cols));
    }
    let k = in_len / cols;
    let expected = checked(rows.checked_mul(k), "rows * k")?;
    same_len(ports.outputs[0].elem_len(), expected, "output length vs rows * k")?;
    Ok(k)
}

impl LinearOp for Operator {
    fn forward(&self, ports: Ports<'_>, input: &[f64], output: &mut [f64]) {
        match self {
            Operator::NoOp | Operator::Concat | Operator::Split => output.copy_from_slice(input),
            Operator::Neg => kernel::scale_into(output, input, -1.0),
            Operator::ScalarMul { alpha } => kernel::scale_into(output, input, *alpha),
            Operator::DenseMatMul { matrix } => {
                let (m, n) = (matrix.rows, matrix.cols);
                output.fill(0.0);
                for (x, y) in input.chunks_exact(n).zip(output.chunks_exact_mut(m)) {
                    for (j, &xj) in x.iter().enumerate() {
                        if xj != 0.0 {
                            kernel::axpy(xj, matrix.column(j), y);
                        }
                    }
                }
            }
            Operator::SparseMatMul { matrix } => {
                let (m, n) = (matrix.rows, matrix.cols);
                for (x, y) in input.chunks_exact(n).zip(output.chunks_exact_mut(m)) {
                    for (r, yr) in y.iter_mut().enumerate() {
                        let (idx, vals) = matrix.row(r);
                        *yr = idx.iter().zip(vals).map(|(&c, v)| v * x[c]).sum();
                    }
                }
            }
            Operator::Sum => {
                let parts = segments(input, ports.inputs);
                output.copy_from_slice(parts[0]);
                for part in &parts[1..] {
                    kernel::add_assign(output, part);
                }
            }
            Operator::Copy => {
                for out in segments_mut(output, ports.outputs) {
                    out.copy_from_slice(input);
                }
            }
            Operator::Vstack => {
                let total_rows = ports.outputs[0].rows();
                let mut row_offset = 0;
                for (block, shape) in segments(input, ports.inputs).into_iter().zip(ports.inputs) {
                    let m = shape.rows();
                    for (c, col) in block.chunks_exact(m.max(1)).enumerate().take(shape.cols()) {
                        let start = c * total_rows + row_offset;
                        output[start..start + m].copy_from_slice(&col[..m]);
                    }
                    row_offset += m;
                }
            }
            Operator::Index { start, step } => {
                for (i, y) in output.iter_mut().enumerate() {
                    *y = input[start + i * step];
                }
            }
            Operator::Transpose => {
                let (r, c) = (ports.inputs[0].rows(), ports.inputs[0].cols());
                for j in 0..c {
                    for i in 0..r {
                        output[j + i * c] = input[i + j * r];
                    }
                }
            }
            Operator::DiagVec => {
                let n = input.len();
                output.fill(0.0);
                for (i, &v) in input.iter().enumerate() {
                    output[i + i * n] = v;
                }
            }
            Operator::DiagMat => {
                let n = output.len();
                for (i, y) in output.iter_mut().enumerate() {
                    *y = input[i + i * n];
                }
            }
            Operator::Conv { kernel: taps } => {
                output.fill(0.0);
                let k = taps.len();
                for (i, &xi) in input.iter().enumerate() {
                    kernel::axpy(xi, taps, &mut output[i..i + k]);
                }
            }
        }
    }

    fn adjoint(&self, ports: Ports<'_>, output: &[f64], input: &mut [f64]) {
        match self {
            Operator::NoOp | Operator::Concat | Operator::Split => input.copy_from_slice(output),
            Operator::Neg => kernel::scale_into(input, output, -1.0),
            Operator::ScalarMul { alpha } => kernel::scale_into(input, output, *alpha),
            Operator::DenseMatMul { matrix } => {
                let (m, n) = (matrix.rows, matrix.cols);
                for (y, x) in output.chunks_exact(m).zip(input.chunks_exact_mut(n)) {
                    for (j, xj) in x.iter_mut().enumerate() {
                        *xj = kernel::dot(matrix.column(j), y);
                    }
                }
            }
            Operator::SparseMatMul { matrix } => {
                let (m, n) = (matrix.rows, matrix.cols);
                input.fill(0.0);
                for (y, x) in output.chunks_exact(m).zip(input.chunks_exact_mut(n)) {
                    for (r, &yr) in y.iter().enumerate() {
                        let (idx, vals) = matrix.row(r);
                        for (&c, v) in idx.iter().zip(vals) {
                            x[c] += v * yr;
                        }
                    }
                }
            }
            Operator::Sum => {
                for part in segments_mut(input, ports.inputs) {
                    part.copy_from_slice(output);
                }
            }
            Operator::Copy => {
                let parts = segments(output, ports.outputs);
                input.copy_from_slice(parts[0]);
                for part in &parts[1..] {
                    kernel::add_assign(input, part);
                }
            }
            Operator::Vstack => {
                let total_rows = ports.outputs[0].rows();
                let mut row_offset = 0;
                for (block, shape) in segments_mut(input, ports.inputs).into_iter().zip(ports.inputs) {
                    let m = shape.rows();
                    for (c, col) in block.chunks_exact_mut(m.max(1)).enumerate().take(shape.cols()) {
                        let start = c * total_rows + row_offset;
                        col[..m].copy_from_slice(&output[start..start + m]);
                    }
                    row_offset += m;
                }
            }
            Operator::Index { start, step } => {
                input.fill(0.0);
                for (i, &y) in output.iter().enumerate() {
                    input[start + i * step] = y;
                }
            }
            Operator::Transpose => {
                let (r, c) = (ports.inputs[0].rows(), ports.inputs[0].cols());
                for j in 0..c {
                    for i in 0..r {
                        input[i + j * r] = output[j + i * c];
                    }
                }
            }
            Operator::DiagVec => {
                let n = input.len();
                for (i, x) in input.iter_mut().enumerate() {
                    *x = output[i + i * n];
                }
            }
            Operator::DiagMat => {
                let n = output.len();
                input.fill(0.0);
                for (i, &y) in output.iter().enumerate() {
                    input[i + i * n] = y;
                }
            }
            Operator::Conv { kernel: taps } => {
                let k = taps.len();
                for (i, x) in input.iter_mut().enumerate() {
                    *x = kernel::dot(taps, &output[i..i + k]);
                }
            }
        }
    }

    fn check_shapes(&self, ports: Ports<'_>) -> Result<(), String> {
        match self {
            Operator::NoOp | Operator::Neg | Operator::ScalarMul { .. } => {
                expect_ports(ports, Some(1), Some(1))?;
                same_len(ports.input_len(), ports.output_len(), "input vs output length")
            }
            Operator::DenseMatMul { matrix } => {
                expect_ports(ports, Some(1), Some(1))?;
                let size = checked(matrix.rows.checked_mul(matrix.cols), "rows * cols")?;
                same_len(matrix.data.len(), size, "matrix data vs rows * cols")?;
                product_columns(matrix.cols, matrix.rows, ports).map(|_| ())
            }
            Operator::SparseMatMul { matrix } => {
                expect_ports(ports, Some(1), Some(1))?;
                matrix.validate()?;
                product_columns(matrix.cols, matrix.rows, ports).map(|_| ())
            }
            Operator::Sum => {
                expect_ports(ports, None, Some(1))?;
                let out = ports.outputs[0].elem_len();
                ports.inputs.iter().try_for_each(|s| same_len(s.elem_len(), out, "summand vs output length"))
            }
            Operator::Copy => {
                expect_ports(ports, Some(1), None)?;
                let inp = ports.inputs[0].elem_len();
                ports.outputs.iter().try_for_each(|s| same_len(s.elem_len(), inp, "copy vs input length"))
            }
            Operator::Concat => {
                expect_ports(ports, None, Some(1))?;
                same_len(ports.input_len(), ports.output_len(), "concatenated inputs vs output length")
            }
            Operator::Split => {
                expect_ports(ports, Some(1), None)?;
                same_len(ports.input_len(), ports.output_len(), "input vs split outputs length")
            }
            Operator::Vstack => {
                expect_ports(ports, None, Some(1))?;
                let out = &ports.outputs[0];
                for s in ports.inputs {
                    same_len(s.cols(), out.cols(), "block columns vs output columns")?;
                }
                let rows = checked(
                    ports.inputs.iter().try_fold(0usize, |acc, s| acc.checked_add(s.rows())),
                    "stacked rows",
                )?;
                same_len(rows, out.rows(), "stacked rows vs output rows")?;
                same_len(ports.input_len(), out.elem_len(), "stacked length vs output length")
            }
            Operator::Index { start, step } => {
                expect_ports(ports, Some(1), Some(1))?;
                if *step == 0 {
                    return Err("index step must be positive".into());
                }
                let (n_in, n_out) = (ports.input_len(), ports.output_len());
                if n_out == 0 {
                    return Ok(());
                }
                let last = checked((n_out - 1).checked_mul(*step).and_then(|o| o.checked_add(*start)), "last index")?;
                if last >= n_in {
                    return Err(format!(
                        "index {} + {} * {} reaches past input of length {}",
                        start,
                        n_out - 1,
                        step,
                        n_in
                    ));
                }
                Ok(())
            }
            Operator::Transpose => {
                expect_ports(ports, Some(1), Some(1))?;
                let (i, o) = (&ports.inputs[0], &ports.outputs[0]);
                same_len(o.rows(), i.cols(), "output rows vs input columns")?;
                same_len(o.cols(), i.rows(), "output columns vs input rows")
            }
            Operator::DiagVec => {
                expect_ports(ports, Some(1), Some(1))?;
                let n = ports.input_len();
                same_len(ports.output_len(), checked(n.checked_mul(n), "n * n")?, "output length vs n * n")
            }
            Operator::DiagMat => {
                expect_ports(ports, Some(1), Some(1))?;
                let n = ports.output_len();
                same_len(ports.input_len(), checked(n.checked_mul(n), "n * n")?, "input length vs n * n")
            }
            Operator::Conv { kernel: taps } => {
                expect_ports(ports, Some(1), Some(1))?;
                if taps.is_empty() {
                    return Err("convolution kernel is empty".into());
                }
                let full = checked(ports.input_len().checked_add(taps.len() - 1), "n + k - 1")?;
                same_len(ports.output_len(), full, "output length vs n + k - 1")
            }
        }
    }
}
