use gpr::prelude::*;
use nalgebra::{DMatrix, DVector};
use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

fn grid_gp(params: GaussianProcessParams) -> GaussianProcess {
    let mut gp = GaussianProcess::from_spec(2, "CovSum ( CovSEiso, CovNoise)")
        .unwrap()
        .with_params(params);
    gp.set_hyperparameters(&[0.0, 0.0, -2.0]).unwrap();
    for i in 0..5 {
        for j in 0..5 {
            let x = [i as f64 / 4.0, j as f64 / 4.0];
            gp.add(&x, x[0] * x[1] + x[0] * (1.0 - x[1])).unwrap();
        }
    }
    gp
}

#[test]
fn predicts_smooth_surface() {
    let mut gp = grid_gp(GaussianProcessParams::default());
    assert_eq!(gp.size(), 25);
    assert_eq!(gp.n_parameters(), 3);

    let (mean, var) = gp.predict_point(&[0.5, 0.5]).unwrap();
    assert::close(mean, 0.5, 0.05);
    assert!(var > 0.0 && var < 1.0);

    let far = gp.predict_point(&[20.0, 20.0]).unwrap();
    assert::close(far.0, 0.0, 1E-6);
    assert::close(far.1, 1.0 + (-4.0_f64).exp(), 1E-6);
}

#[test]
fn four_corners() {
    let mut gp = GaussianProcess::from_spec(2, "CovSum(CovSEiso, CovNoise)")
        .unwrap();
    gp.set_hyperparameters(&[0.0, 0.0, -2.0]).unwrap();
    let xs = DMatrix::from_row_slice(4, 2, &[0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0]);
    let ys = DVector::from_column_slice(&[0.0, 0.5, 0.5, 1.0]);
    gp.add_batch(&xs, &ys).unwrap();
    assert_eq!(gp.size(), 4);

    let pred = gp.predict(&DMatrix::from_row_slice(1, 2, &[0.5, 0.5]), true).unwrap();
    assert::close(pred[(0, 0)], 0.5, 0.15);
    assert!(pred[(0, 1)] > 0.0 && pred[(0, 1)] < 1.0);
}

#[test]
fn incremental_and_full_factorizations_agree() {
    let mut inc = grid_gp(GaussianProcessParams::default());
    let mut full =
        grid_gp(GaussianProcessParams::default().with_incremental(false));

    // factor part of the data, then grow it
    inc.compute().unwrap();
    let mut rng = Xoshiro256Plus::seed_from_u64(0xABCD);
    for _ in 0..10 {
        let x = [rng.gen::<f64>(), rng.gen::<f64>()];
        let y = rng.gen::<f64>();
        inc.add(&x, y).unwrap();
        full.add(&x, y).unwrap();
        inc.log_likelihood().unwrap();
    }

    assert::close(
        inc.log_likelihood().unwrap(),
        full.log_likelihood().unwrap(),
        1E-6,
    );
    let queries = DMatrix::from_row_slice(3, 2, &[0.1, 0.9, 0.5, 0.5, 1.3, -0.2]);
    let a = inc.predict(&queries, true).unwrap();
    let b = full.predict(&queries, true).unwrap();
    assert!(a.relative_eq(&b, 1E-6, 1E-6));

    let ga = inc.log_likelihood_gradient().unwrap();
    let gb = full.log_likelihood_gradient().unwrap();
    assert!(ga.relative_eq(&gb, 1E-6, 1E-6));
}

#[test]
fn mismatched_batch_leaves_process_unchanged() {
    let mut gp = grid_gp(GaussianProcessParams::default());
    let before = gp.log_likelihood().unwrap();

    let xs = DMatrix::zeros(3, 2);
    let ys = DVector::zeros(2);
    let res = gp.add_batch(&xs, &ys);
    assert!(matches!(res, Err(GpError::DimensionMismatch { .. })));

    let res = gp.add(&[0.1, 0.2, 0.3], 1.0);
    assert!(matches!(res, Err(GpError::DimensionMismatch { .. })));

    assert_eq!(gp.size(), 25);
    assert_eq!(gp.state(), FactorState::Valid);
    assert_eq!(gp.log_likelihood().unwrap(), before);
}

#[test]
fn duplicated_inputs_without_noise_are_jittered() {
    let mut gp = GaussianProcess::from_spec(1, "CovSEiso").unwrap();
    for _ in 0..4 {
        gp.add(&[0.25], 1.0).unwrap();
    }
    let (mean, var) = gp.predict_point(&[0.25]).unwrap();
    assert::close(mean, 1.0, 1E-3);
    assert!(var >= 0.0);
}

#[test]
fn unknown_covariance_is_a_configuration_error() {
    let res = GaussianProcess::from_spec(2, "CovSum(CovSEiso, CovBogus)");
    assert!(matches!(
        res,
        Err(GpError::Configuration(KernelError::UnknownKernel(_)))
    ));
}

#[test]
fn restored_state_has_same_likelihood() {
    let mut gp = grid_gp(GaussianProcessParams::default());
    let state = gp.to_state();
    let mut restored = GaussianProcess::from_state(&state).unwrap();
    assert_eq!(restored.size(), gp.size());
    assert::close(
        restored.log_likelihood().unwrap(),
        gp.log_likelihood().unwrap(),
        1E-10,
    );

    let held_out = DMatrix::from_row_slice(2, 2, &[0.33, 0.66, -1.0, 2.0]);
    let a = gp.predict(&held_out, true).unwrap();
    let b = restored.predict(&held_out, true).unwrap();
    assert!(a.relative_eq(&b, 1E-10, 1E-10));
}

proptest! {
    #[test]
    fn size_tracks_additions_and_variance_is_nonnegative(
        xs in prop::collection::vec((-3.0_f64..3.0, -3.0_f64..3.0), 1..20),
        qx in -5.0_f64..5.0,
        qy in -5.0_f64..5.0,
    ) {
        let mut gp = GaussianProcess::from_spec(2, "CovSum(CovSEiso, CovNoise)")
            .unwrap();
        gp.set_hyperparameters(&[0.0, 0.0, -2.0]).unwrap();
        for (i, (a, b)) in xs.iter().enumerate() {
            gp.add(&[*a, *b], (a + b).sin()).unwrap();
            prop_assert_eq!(gp.size(), i + 1);
        }
        let (mean, var) = gp.predict_point(&[qx, qy]).unwrap();
        prop_assert!(mean.is_finite());
        prop_assert!(var >= 0.0);
        prop_assert!(var <= 1.0 + (-4.0_f64).exp() + 1E-9);
        prop_assert!(gp.log_likelihood().unwrap().is_finite());
    }
}
