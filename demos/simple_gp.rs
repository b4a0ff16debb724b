use nalgebra::{DMatrix, DVector};
use rand::{rngs::SmallRng, SeedableRng};

use gpr::prelude::*;

pub fn main() {
    env_logger::builder().init();
    let mut rng = SmallRng::seed_from_u64(0xABCD);

    // Data
    let xs: DMatrix<f64> = DMatrix::from_column_slice(
        20,
        1,
        &[
            0.1, 0.61578947, 1.13157895, 1.64736842, 2.16315789, 2.67894737,
            3.19473684, 3.71052632, 4.22631579, 4.74210526, 5.25789474,
            5.77368421, 6.28947368, 6.80526316, 7.32105263, 7.83684211,
            8.35263158, 8.86842105, 9.38421053, 9.9,
        ],
    );
    let ys: DVector<f64> = xs.map(|x| x * x.sin()).column(0).into();

    let mut gp = GaussianProcess::from_spec(1, "CovSum(CovSEiso, CovNoise)")
        .expect("Specification is valid");
    gp.set_hyperparameters(&[0.0, 0.0, -1.0])
        .expect("Three hyperparameters are expected");
    gp.add_batch(&xs, &ys).expect("Data is valid so this should succeed");

    println!("Initial theta = {}", gp.hyperparameters());
    println!("Initial ln_m = {}", gp.log_likelihood().unwrap());

    let opt = gp
        .optimize(&RProp::default(), 100, true)
        .expect("Optimization should succeed");
    println!("Optimized kernel = {}", gp.kernel());
    println!("Optimized theta = {}", opt.hyperparameters);
    println!("ln_m = {}", opt.log_likelihood);

    let queries = DMatrix::from_fn(9, 1, |i, _| i as f64 + 0.5);
    let pred = gp.predict(&queries, true).expect("Queries are 1-D");
    for (x, row) in queries.iter().zip(pred.row_iter()) {
        println!("f({x:.1}) = {:.3} ± {:.3} (truth {:.3})", row[0], row[1].sqrt(), x * x.sin());
    }

    // A draw from the fitted prior, for comparison
    let draw = gp.draw_prior_sample(&queries, &mut rng).unwrap();
    println!("prior draw = {}", draw.transpose());

    let state = gp.to_state();
    println!("state = {:?}", state);
}
