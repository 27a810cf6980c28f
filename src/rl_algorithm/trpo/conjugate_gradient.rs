use ndarray::{Array1, NdFloat};

/// Solves `A x = b` for symmetric positive definite `A`, given only the
/// product `x -> A x`.
pub fn conjugate_gradient<F, Op>(mut apply: Op, b: &Array1<F>, iters: usize, residual_tol: F) -> Array1<F>
where
    F: NdFloat,
    Op: FnMut(&Array1<F>) -> Array1<F>,
{
    let mut x = Array1::<F>::zeros(b.len());
    let mut r = b.clone();
    let mut p = b.clone();
    let mut rdotr = r.dot(&r);
    for _ in 0..iters {
        if rdotr < residual_tol {
            break;
        }
        let z = apply(&p);
        let pz = p.dot(&z);
        if pz <= F::zero() {
            break;
        }
        let alpha = rdotr / pz;
        x.scaled_add(alpha, &p);
        r.scaled_add(-alpha, &z);
        let new_rdotr = r.dot(&r);
        let beta = new_rdotr / rdotr;
        p = &r + &(p * beta);
        rdotr = new_rdotr;
    }
    return x;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_solves_spd_system() {
        let a: Array2<f64> = array![[4.0, 1.0, 0.0], [1.0, 3.0, 0.5], [0.0, 0.5, 2.0]];
        let b = array![1.0, 2.0, 3.0];
        let x = conjugate_gradient(|v| a.dot(v), &b, 10, 1e-20);
        let residual = &a.dot(&x) - &b;
        assert!(residual.iter().all(|r| r.abs() < 1e-8));
    }

    #[test]
    fn test_zero_rhs() {
        let b = Array1::<f32>::zeros(4);
        let x = conjugate_gradient(|v| v.clone(), &b, 10, 1e-10);
        assert_eq!(x, Array1::<f32>::zeros(4));
    }
}
