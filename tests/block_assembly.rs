//! Block Jacobian of bundle adjustment against the dense global Jacobian.

mod common;

use adsweep::{
    ba_objective_trace, ba_residuals, BaProblem, BlockJacobianAssembler, Error, Evaluator,
    TapeStore,
};
use approx::assert_relative_eq;
use common::ReferenceReprojection;

const GLOBAL: u32 = adsweep::extract::BA_GLOBAL_TAG;

fn two_observations() -> BaProblem {
    BaProblem {
        cam_params: 9,
        cams: vec![0.05, -0.02, 0.03, 0.1, -0.2, 0.0, 1.5, 1e-3, -2e-3],
        points: vec![0.3, -0.4, 5.0],
        weights: vec![0.9, 1.2],
        obs: vec![[0, 0], [0, 0]],
        feats: vec![[0.1, -0.1], [0.05, 0.2]],
    }
}

fn dense_global(problem: &BaProblem, weight_rows: bool) -> Vec<Vec<f64>> {
    let store = TapeStore::new();
    ba_objective_trace(&store, &ReferenceReprojection, problem, weight_rows).unwrap();
    Evaluator::new(&store)
        .jacobian(GLOBAL, &problem.parameters())
        .unwrap()
}

fn assert_matches_dense(sparse: &[Vec<f64>], dense: &[Vec<f64>]) {
    assert_eq!(sparse.len(), dense.len());
    for (rs, rd) in sparse.iter().zip(dense) {
        for (a, b) in rs.iter().zip(rd) {
            assert_relative_eq!(a, b, max_relative = 1e-12, epsilon = 1e-14);
        }
    }
}

#[test]
fn one_camera_one_point_two_observations() {
    let problem = two_observations();
    let ba = BlockJacobianAssembler::new(&ReferenceReprojection)
        .with_weight_rows(false)
        .assemble(&problem)
        .unwrap();
    let j = &ba.jacobian;

    assert_eq!(j.nrows, 4);
    assert_eq!(j.ncols, 9 + 3 + 2);
    assert_eq!(j.nnz(), 4 * 13);
    assert!(j.is_well_formed());

    // Rows of observation i touch camera, point and weight i only.
    let weight_col = |i: usize| 12 + i;
    for row in 0..4 {
        let obs = row / 2;
        let (cols, _) = j.row(row);
        assert!(cols.iter().all(|&c| (c as usize) < 12 || c as usize == weight_col(obs)));
        assert_eq!(j.get(row, weight_col(1 - obs)), 0.0);
    }

    let (reproj, w_err) = ba_residuals(&ReferenceReprojection, &problem).unwrap();
    assert_eq!(ba.reproj_err, reproj);
    assert_eq!(ba.w_err, w_err);
    assert_matches_dense(&j.to_dense(), &dense_global(&problem, false));
}

#[test]
fn weight_rows_follow_reprojection_rows() {
    let problem = two_observations();
    let ba = BlockJacobianAssembler::new(&ReferenceReprojection)
        .assemble(&problem)
        .unwrap();
    let j = &ba.jacobian;

    assert_eq!(j.nrows, 6);
    assert_eq!(j.nnz(), 4 * 13 + 2);
    for (i, &w) in problem.weights.iter().enumerate() {
        let (cols, vals) = j.row(4 + i);
        assert_eq!(cols, &[(12 + i) as u32]);
        assert_relative_eq!(vals[0], -2.0 * w, max_relative = 1e-15);
    }
    assert_matches_dense(&j.to_dense(), &dense_global(&problem, true));
}

#[test]
fn random_problems_match_global_jacobian() {
    common::init_tracing();
    let mut rng = common::rng(21);
    for &(cam_params, n_cams, n_points, n_obs) in &[(11, 3, 5, 12), (9, 2, 4, 7), (11, 1, 1, 3)] {
        let problem = common::random_ba(&mut rng, cam_params, n_cams, n_points, n_obs);
        let ba = BlockJacobianAssembler::new(&ReferenceReprojection)
            .assemble(&problem)
            .unwrap();
        let j = &ba.jacobian;

        assert!(j.is_well_formed());
        assert!(j.row_ptr.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(j.nnz(), problem.layout(true).nnz());
        assert_eq!(j.nnz(), n_obs * (2 * (cam_params + 4) + 1));
        assert_matches_dense(&j.to_dense(), &dense_global(&problem, true));
    }
}

#[test]
fn assembly_is_deterministic() {
    let mut rng = common::rng(5);
    let problem = common::random_ba(&mut rng, 11, 4, 6, 20);
    let assembler = BlockJacobianAssembler::new(&ReferenceReprojection);
    let a = assembler.assemble(&problem).unwrap();
    let b = assembler.assemble(&problem).unwrap();
    assert_eq!(a, b);
}

#[test]
fn local_block_matches_dense_block() {
    let problem = two_observations();
    let store = TapeStore::new();
    let assembler = BlockJacobianAssembler::new(&ReferenceReprojection);
    let (err, block) = assembler
        .local_block(&store, problem.camera(0), problem.point(0), 0.9, &problem.feats[0])
        .unwrap();
    assert_eq!((block.rows, block.cols), (2, 13));

    let dense = dense_global(&problem, false);
    for r in 0..2 {
        for c in 0..12 {
            assert_relative_eq!(
                block.get(r, c),
                dense[r][c],
                max_relative = 1e-12,
                epsilon = 1e-14
            );
        }
        assert_relative_eq!(block.get(r, 12), dense[r][12], max_relative = 1e-12);
    }
    let (reproj, _) = ba_residuals(&ReferenceReprojection, &problem).unwrap();
    assert_eq!(err.to_vec(), reproj[..2].to_vec());
}

#[test]
fn invalid_observation_is_rejected() {
    let mut problem = two_observations();
    problem.obs[1] = [1, 0];
    let err = BlockJacobianAssembler::new(&ReferenceReprojection)
        .assemble(&problem)
        .unwrap_err();
    assert!(matches!(err, Error::Layout(_)));
}

#[test]
fn empty_problem_gives_empty_matrix() {
    let problem = BaProblem {
        cam_params: 11,
        cams: vec![0.0; 11],
        points: vec![0.0, 0.0, 1.0],
        ..Default::default()
    };
    let ba = BlockJacobianAssembler::new(&ReferenceReprojection)
        .assemble(&problem)
        .unwrap();
    assert_eq!(ba.jacobian.nrows, 0);
    assert_eq!(ba.jacobian.ncols, 14);
    assert_eq!(ba.jacobian.nnz(), 0);
    assert!(ba.w_err.is_empty());
}

