//! The batched tensor type and its broadcasting algebra.
//!
//! Every distribution and transform in batchdist operates on [`Tensor`]:
//! an `f64` array of dynamic rank with shared (reference-counted) storage.
//! Shared storage makes clones cheap and lets the transform memo cache
//! return the *same* buffer on a cached round-trip, which callers can
//! verify with [`same_storage`].
//!
//! Scalars are genuine zero-dimensional arrays (`shape == []`); there is
//! no `(1,)` fallback anywhere in this crate.

use ndarray::{arr0, Array1, Array2, ArrayD, Axis, IxDyn, Zip};

use crate::error::{Error, Result};

/// Batched numeric array: `f64`, dynamic rank, shared storage.
pub type Tensor = ndarray::ArcArray<f64, IxDyn>;

/// Wrap a plain `f64` as a zero-dimensional tensor.
pub fn scalar(v: f64) -> Tensor {
    arr0(v).into_dyn().into_shared()
}

/// Conversion into [`Tensor`] for constructor arguments.
///
/// Distribution constructors accept plain floats, vectors, slices, and
/// `ndarray` arrays interchangeably; floats become zero-dimensional
/// tensors with empty batch shape.
pub trait IntoTensor {
    /// Perform the conversion.
    fn into_tensor(self) -> Tensor;
}

impl IntoTensor for Tensor {
    fn into_tensor(self) -> Tensor {
        self
    }
}

impl IntoTensor for &Tensor {
    fn into_tensor(self) -> Tensor {
        self.clone()
    }
}

impl IntoTensor for f64 {
    fn into_tensor(self) -> Tensor {
        scalar(self)
    }
}

impl IntoTensor for Vec<f64> {
    fn into_tensor(self) -> Tensor {
        Array1::from(self).into_dyn().into_shared()
    }
}

impl IntoTensor for &[f64] {
    fn into_tensor(self) -> Tensor {
        Array1::from(self.to_vec()).into_dyn().into_shared()
    }
}

impl IntoTensor for ArrayD<f64> {
    fn into_tensor(self) -> Tensor {
        self.into_shared()
    }
}

impl IntoTensor for Array1<f64> {
    fn into_tensor(self) -> Tensor {
        self.into_dyn().into_shared()
    }
}

impl IntoTensor for Array2<f64> {
    fn into_tensor(self) -> Tensor {
        self.into_dyn().into_shared()
    }
}

/// Broadcast two shapes against each other with trailing-dimension rules.
///
/// Dimensions align from the right; size-1 dimensions stretch; missing
/// leading dimensions count as size 1. Mismatched non-1 sizes are a
/// validation error.
pub fn broadcast_shapes(a: &[usize], b: &[usize]) -> Result<Vec<usize>> {
    let ndim = a.len().max(b.len());
    let mut out = vec![0usize; ndim];
    for i in 0..ndim {
        let da = if i < a.len() { a[a.len() - 1 - i] } else { 1 };
        let db = if i < b.len() { b[b.len() - 1 - i] } else { 1 };
        out[ndim - 1 - i] = if da == db || db == 1 {
            da
        } else if da == 1 {
            db
        } else {
            return Err(Error::Validation(format!(
                "shapes {:?} and {:?} are not broadcast-compatible (sizes {} vs {})",
                a, b, da, db
            )));
        };
    }
    Ok(out)
}

/// Broadcast shape of an arbitrary list of shapes.
pub fn broadcast_shapes_all(shapes: &[&[usize]]) -> Result<Vec<usize>> {
    let mut acc: Vec<usize> = Vec::new();
    for s in shapes {
        acc = broadcast_shapes(&acc, s)?;
    }
    Ok(acc)
}

/// Materialize a tensor at the given broadcast shape.
pub fn broadcast_to(t: &Tensor, shape: &[usize]) -> Result<Tensor> {
    let view = t.broadcast(IxDyn(shape)).ok_or_else(|| {
        Error::Validation(format!(
            "cannot broadcast shape {:?} to {:?}",
            t.shape(),
            shape
        ))
    })?;
    Ok(view.to_owned().into_shared())
}

/// Broadcast all tensors to their common shape.
///
/// This is what distribution constructors call on their array-valued
/// parameters; incompatibility fails here, at construction time.
pub fn broadcast_all(tensors: &[&Tensor]) -> Result<Vec<Tensor>> {
    let shapes: Vec<&[usize]> = tensors.iter().map(|t| t.shape()).collect();
    let common = broadcast_shapes_all(&shapes)?;
    tensors.iter().map(|t| broadcast_to(t, &common)).collect()
}

/// Elementwise unary map.
pub fn map1(a: &Tensor, f: impl Fn(f64) -> f64) -> Tensor {
    a.map(|&x| f(x)).into_shared()
}

/// Elementwise binary map with co-broadcasting of both operands.
pub fn map2(a: &Tensor, b: &Tensor, f: impl Fn(f64, f64) -> f64) -> Result<Tensor> {
    let common = broadcast_shapes(a.shape(), b.shape())?;
    let va = a.broadcast(IxDyn(&common)).ok_or_else(broadcast_bug)?;
    let vb = b.broadcast(IxDyn(&common)).ok_or_else(broadcast_bug)?;
    Ok(Zip::from(&va).and(&vb).map_collect(|&x, &y| f(x, y)).into_shared())
}

/// Elementwise ternary map with co-broadcasting of all operands.
pub fn map3(
    a: &Tensor,
    b: &Tensor,
    c: &Tensor,
    f: impl Fn(f64, f64, f64) -> f64,
) -> Result<Tensor> {
    let common = broadcast_shapes_all(&[a.shape(), b.shape(), c.shape()])?;
    let va = a.broadcast(IxDyn(&common)).ok_or_else(broadcast_bug)?;
    let vb = b.broadcast(IxDyn(&common)).ok_or_else(broadcast_bug)?;
    let vc = c.broadcast(IxDyn(&common)).ok_or_else(broadcast_bug)?;
    Ok(Zip::from(&va)
        .and(&vb)
        .and(&vc)
        .map_collect(|&x, &y, &z| f(x, y, z))
        .into_shared())
}

fn broadcast_bug() -> Error {
    // broadcast_shapes already proved compatibility
    Error::Computation("broadcast to precomputed common shape failed".into())
}

/// Sum over the last `k` axes.
///
/// `k == 0` is a no-op clone. Used to collapse event dimensions after
/// elementwise log-density or Jacobian computations.
pub fn sum_trailing(t: &Tensor, k: usize) -> Tensor {
    if k == 0 {
        return t.clone();
    }
    let mut acc: ArrayD<f64> = t.to_owned();
    for _ in 0..k {
        let last = acc.ndim() - 1;
        acc = acc.sum_axis(Axis(last));
    }
    acc.into_shared()
}

/// Extract the single element of a zero-dimensional (or one-element)
/// tensor.
///
/// Panics on an empty tensor; intended for scalar results in tests and
/// scalar-parameter code paths.
pub fn item(t: &Tensor) -> f64 {
    *t.iter().next().expect("item() on empty tensor")
}

/// Whether two tensors are views of the identical storage and layout.
///
/// This is the "identity, not merely equality" test the transform memo
/// cache guarantees for cached round-trips.
pub fn same_storage(a: &Tensor, b: &Tensor) -> bool {
    a.as_ptr() == b.as_ptr() && a.shape() == b.shape() && a.strides() == b.strides()
}

/// Apply `f` to each last-axis row, producing rows of length `out_len`.
///
/// The input must have at least one axis; the output shape is the input's
/// leading shape plus `[out_len]`. This is the workhorse for families and
/// transforms whose event is a vector along the last axis.
pub fn map_rows(
    t: &Tensor,
    out_len: usize,
    f: impl Fn(&[f64], &mut [f64]),
) -> Result<Tensor> {
    if t.ndim() < 1 {
        return Err(Error::Validation(
            "row operation needs at least one axis".into(),
        ));
    }
    let k = t.shape()[t.ndim() - 1];
    let lead: Vec<usize> = t.shape()[..t.ndim() - 1].to_vec();
    let n: usize = lead.iter().product();
    let flat = t
        .to_owned()
        .into_shape((n, k))
        .map_err(|e| Error::Computation(e.to_string()))?;
    let mut out = vec![0.0; n * out_len];
    for i in 0..n {
        let row: Vec<f64> = flat.row(i).iter().cloned().collect();
        f(&row, &mut out[i * out_len..(i + 1) * out_len]);
    }
    let mut shape = lead;
    shape.push(out_len);
    Ok(ArrayD::from_shape_vec(IxDyn(&shape), out)
        .map_err(|e| Error::Computation(e.to_string()))?
        .into_shared())
}

/// Reduce each last-axis row to a scalar with `f`.
///
/// The output shape is the input's leading shape.
pub fn reduce_rows(t: &Tensor, f: impl Fn(&[f64]) -> f64) -> Result<Tensor> {
    if t.ndim() < 1 {
        return Err(Error::Validation(
            "row reduction needs at least one axis".into(),
        ));
    }
    let k = t.shape()[t.ndim() - 1];
    let lead: Vec<usize> = t.shape()[..t.ndim() - 1].to_vec();
    let n: usize = lead.iter().product();
    let flat = t
        .to_owned()
        .into_shape((n, k))
        .map_err(|e| Error::Computation(e.to_string()))?;
    let out: Vec<f64> = (0..n)
        .map(|i| {
            let row: Vec<f64> = flat.row(i).iter().cloned().collect();
            f(&row)
        })
        .collect();
    Ok(ArrayD::from_shape_vec(IxDyn(&lead), out)
        .map_err(|e| Error::Computation(e.to_string()))?
        .into_shared())
}

/// Reduce paired last-axis rows of two co-broadcast tensors to a scalar.
///
/// Leading (batch) dims of `a` and `b` broadcast against each other; the
/// last axes may differ in length (`f` sees both rows). Output shape is
/// the broadcast leading shape.
pub fn zip_reduce_rows(
    a: &Tensor,
    b: &Tensor,
    f: impl Fn(&[f64], &[f64]) -> f64,
) -> Result<Tensor> {
    if a.ndim() < 1 || b.ndim() < 1 {
        return Err(Error::Validation(
            "row reduction needs at least one axis".into(),
        ));
    }
    let (ka, kb) = (a.shape()[a.ndim() - 1], b.shape()[b.ndim() - 1]);
    let lead = broadcast_shapes(
        &a.shape()[..a.ndim() - 1],
        &b.shape()[..b.ndim() - 1],
    )?;
    let mut sa = lead.clone();
    sa.push(ka);
    let mut sb = lead.clone();
    sb.push(kb);
    let fa = broadcast_to(a, &sa)?;
    let fb = broadcast_to(b, &sb)?;
    let n: usize = lead.iter().product();
    let fa = fa
        .to_owned()
        .into_shape((n, ka))
        .map_err(|e| Error::Computation(e.to_string()))?;
    let fb = fb
        .to_owned()
        .into_shape((n, kb))
        .map_err(|e| Error::Computation(e.to_string()))?;
    let out: Vec<f64> = (0..n)
        .map(|i| {
            let ra: Vec<f64> = fa.row(i).iter().cloned().collect();
            let rb: Vec<f64> = fb.row(i).iter().cloned().collect();
            f(&ra, &rb)
        })
        .collect();
    Ok(ArrayD::from_shape_vec(IxDyn(&lead), out)
        .map_err(|e| Error::Computation(e.to_string()))?
        .into_shared())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_shapes_trailing_rules() {
        assert_eq!(broadcast_shapes(&[3, 1], &[4]).unwrap(), vec![3, 4]);
        assert_eq!(broadcast_shapes(&[], &[2, 5]).unwrap(), vec![2, 5]);
        assert_eq!(broadcast_shapes(&[7, 1, 5], &[1, 4, 1]).unwrap(), vec![7, 4, 5]);
    }

    #[test]
    fn test_broadcast_shapes_incompatible() {
        assert!(broadcast_shapes(&[3], &[4]).is_err());
        assert!(broadcast_shapes(&[2, 3], &[3, 3, 2]).is_err());
    }

    #[test]
    fn test_map2_broadcasts_both_sides() {
        let a = vec![1.0, 2.0, 3.0].into_tensor();
        let b = scalar(10.0);
        let s = map2(&a, &b, |x, y| x + y).unwrap();
        assert_eq!(s.shape(), &[3]);
        assert_eq!(s[[1]], 12.0);
    }

    #[test]
    fn test_scalar_is_zero_dimensional() {
        let s = scalar(2.5);
        assert_eq!(s.shape(), &[] as &[usize]);
        assert_eq!(s.iter().count(), 1);
    }

    #[test]
    fn test_sum_trailing() {
        let t = ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![1.0; 6])
            .unwrap()
            .into_shared();
        let s = sum_trailing(&t, 1);
        assert_eq!(s.shape(), &[2]);
        assert_eq!(s[[0]], 3.0);
        assert!(same_storage(&t, &sum_trailing(&t, 0)));
    }

    #[test]
    fn test_same_storage_discriminates() {
        let a = vec![1.0, 2.0].into_tensor();
        let b = a.clone();
        let c = vec![1.0, 2.0].into_tensor();
        assert!(same_storage(&a, &b));
        assert!(!same_storage(&a, &c));
    }
}
