//! All backends against the reference problem y = 0, q = 1 on [0, 1].

use em_sim::{
    BdfOptions, ElectromechanicalSystem, RunDescriptor, SolverKind, State, Trajectory,
};

/// (t, y, dy, q, dq)
const REFERENCE: [(f64, f64, f64, f64, f64); 2] = [
    (
        0.5,
        0.0552649927833715,
        0.217138136315970,
        0.913098715067955,
        -0.345108682051350,
    ),
    (
        1.0,
        0.209457937508594,
        0.388411951826135,
        0.660739021986070,
        -0.654109205664673,
    ),
];

fn reference_run(dt: f64) -> RunDescriptor {
    RunDescriptor::new(State::new(0.0, 0.0, 1.0, 0.0), 0.0, 1.0, dt).unwrap()
}

fn solve(kind: SolverKind, run: &RunDescriptor) -> Trajectory {
    let sol = kind
        .integrate(&ElectromechanicalSystem::default(), run)
        .unwrap();
    assert!(sol.is_complete(), "{} halted: {:?}", kind.name(), sol.failure);
    sol.trajectory
}

fn assert_matches_reference(traj: &Trajectory, margin: f64, label: &str) {
    assert_eq!(traj.len(), 3, "{label}: trajectory length");
    let first = traj.first().unwrap();
    assert_eq!(first.time, 0.0);
    assert!(first.state.y.abs() < margin);
    assert!((first.state.q - 1.0).abs() < margin);

    for (i, (t, y, dy, q, dq)) in REFERENCE.iter().enumerate() {
        let snap = traj.get(i + 1).unwrap();
        assert!((snap.time - t).abs() < 1e-12, "{label}: time at {t}");
        assert!((snap.state.y - y).abs() < margin, "{label}: y({t})");
        assert!((snap.state.dy - dy).abs() < margin, "{label}: dy({t})");
        assert!((snap.state.q - q).abs() < margin, "{label}: q({t})");
        assert!((snap.state.dq - dq).abs() < margin, "{label}: dq({t})");
    }
}

#[test]
fn rk4_matches_reference_within_1e_2() {
    let traj = solve(SolverKind::Rk4, &reference_run(0.5));
    assert_matches_reference(&traj, 1e-2, "rk4");
}

#[test]
fn ode_solvers_rk4_matches_reference_within_1e_2() {
    let traj = solve(SolverKind::OdeSolversRk4, &reference_run(0.5));
    assert_matches_reference(&traj, 1e-2, "ode_solvers");
}

#[test]
fn bdf_matches_reference_within_1e_4() {
    let traj = solve(SolverKind::Bdf(BdfOptions::default()), &reference_run(0.5));
    assert_matches_reference(&traj, 1e-4, "bdf");
}

#[test]
fn backends_agree_on_a_longer_horizon() {
    let run = RunDescriptor::new(State::new(0.5, 0.0, 1.0, 0.0), 0.0, 10.0, 0.1).unwrap();
    let rk4 = solve(SolverKind::Rk4, &run);
    let bdf = solve(SolverKind::Bdf(BdfOptions::default()), &run);
    let ode = solve(SolverKind::OdeSolversRk4, &run);

    assert_eq!(rk4.len(), 101);
    assert_eq!(bdf.len(), rk4.len());
    assert_eq!(ode.len(), rk4.len());

    for ((a, b), c) in rk4.iter().zip(bdf.iter()).zip(ode.iter()) {
        assert_eq!(a.time, b.time);
        assert_eq!(a.time, c.time);
        for ((x, y), z) in a
            .state
            .to_array()
            .iter()
            .zip(b.state.to_array())
            .zip(c.state.to_array())
        {
            assert!((x - y).abs() < 5e-3, "rk4 vs bdf at t = {}", a.time);
            assert!((x - z).abs() < 1e-9, "rk4 vs ode_solvers at t = {}", a.time);
        }
    }
}

#[test]
fn every_backend_preserves_the_initial_condition() {
    let initial = State::new(0.5, 0.0, 1.0, 0.0);
    let run = RunDescriptor::new(initial, 0.0, 1.0, 0.1).unwrap();
    for kind in [
        SolverKind::Rk4,
        SolverKind::Bdf(BdfOptions::default()),
        SolverKind::OdeSolversRk4,
    ] {
        let traj = solve(kind, &run);
        let first = traj.first().unwrap();
        assert_eq!(first.time, 0.0);
        for (a, b) in first.state.to_array().iter().zip(initial.to_array()) {
            assert!((a - b).abs() <= 1e-10, "{}", kind.name());
        }
    }
}

#[test]
fn every_backend_uses_the_same_length_policy() {
    for (t_end, dt, expected) in [(1.0, 0.5, 3), (1.0, 0.1, 11), (1.0, 0.3, 4), (10.0, 0.001, 10_001)] {
        let run = RunDescriptor::new(State::new(0.0, 0.0, 1.0, 0.0), 0.0, t_end, dt).unwrap();
        assert_eq!(run.expected_len(), expected);
        for kind in [
            SolverKind::Rk4,
            SolverKind::Bdf(BdfOptions::default()),
            SolverKind::OdeSolversRk4,
        ] {
            let traj = solve(kind, &run);
            assert_eq!(traj.len(), expected, "{} on [0, {t_end}] / {dt}", kind.name());
            assert!(traj.last().unwrap().time <= t_end + 1e-12);
        }
    }
}

#[test]
fn rk4_runs_are_bit_identical() {
    let run = RunDescriptor::new(State::new(0.7, 0.1, 1.0, -0.2), 0.0, 10.0, 0.001).unwrap();
    let a = solve(SolverKind::Rk4, &run);
    let b = solve(SolverKind::Rk4, &run);
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b.iter()) {
        assert_eq!(x.time.to_bits(), y.time.to_bits());
        for (u, v) in x.state.to_array().iter().zip(y.state.to_array()) {
            assert_eq!(u.to_bits(), v.to_bits());
        }
    }
}
