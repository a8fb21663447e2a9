use gantry_core::{Pid, PidCfg};
use rstest::rstest;

fn symmetric_cfg() -> PidCfg {
    // symmetric output window so negative outputs are observable
    PidCfg {
        output_min: -100.0,
        output_max: 100.0,
        ..PidCfg::default()
    }
}

#[test]
fn reset_then_equal_inputs_returns_zero() {
    let mut pid = Pid::new(&PidCfg::default()).expect("pid build");
    pid.calculate(200.0, 120.0);
    pid.calculate(200.0, 140.0);
    pid.reset();
    assert_eq!(pid.calculate(200.0, 200.0), 0.0);
}

#[test]
fn outputs_are_antisymmetric_about_the_setpoint() {
    // measured = setpoint +/- 1 must yield equal magnitude, opposite sign,
    // modulo integral history (fresh regulator each side).
    let mut above = Pid::new(&symmetric_cfg()).expect("pid build");
    let mut below = Pid::new(&symmetric_cfg()).expect("pid build");

    let hot = above.calculate(200.0, 201.0);
    let cold = below.calculate(200.0, 199.0);

    assert!(hot < 0.0, "over temperature must push output down");
    assert!(cold > 0.0, "under temperature must push output up");
    assert!(
        (hot + cold).abs() < 1e-9,
        "expected antisymmetry, got {hot} vs {cold}"
    );
}

#[rstest]
#[case(200.0, -1_000.0)]
#[case(200.0, 1_000.0)]
#[case(0.0, 5_505.0)]
fn output_is_always_clamped(#[case] setpoint: f64, #[case] measured: f64) {
    let cfg = PidCfg::default();
    let mut pid = Pid::new(&cfg).expect("pid build");
    for _ in 0..50 {
        let out = pid.calculate(setpoint, measured);
        assert!(
            (cfg.output_min..=cfg.output_max).contains(&out),
            "output {out} escaped [{}, {}]",
            cfg.output_min,
            cfg.output_max
        );
    }
}

#[test]
fn small_errors_do_not_accumulate_integral() {
    let cfg = PidCfg {
        epsilon: 0.5,
        ..symmetric_cfg()
    };
    let mut pid = Pid::new(&cfg).expect("pid build");
    // error of 0.4 is inside epsilon: only P and D terms act, and with a
    // constant error the D term dies after the first step
    pid.calculate(100.0, 99.6);
    let first = pid.calculate(100.0, 99.6);
    let second = pid.calculate(100.0, 99.6);
    assert_eq!(first, second, "integral must stay frozen inside epsilon");
}

#[test]
fn invalid_configs_are_rejected() {
    let inverted = PidCfg {
        output_min: 100.0,
        output_max: 0.0,
        ..PidCfg::default()
    };
    assert!(Pid::new(&inverted).is_err());

    let zero_dt = PidCfg {
        dt_s: 0.0,
        ..PidCfg::default()
    };
    assert!(Pid::new(&zero_dt).is_err());
}
