use gantry_hardware::{SimAdc, SimBoard, SimPwm};
use gantry_traits::{Adc, Board, Pwm};

#[test]
fn sim_adc_tracks_its_handle() {
    let (mut adc, handle) = SimAdc::new(100);
    assert_eq!(adc.read(0).unwrap(), 100);
    handle.set_raw(900);
    assert_eq!(adc.read(3).unwrap(), 900);
}

#[test]
fn sim_pwm_clamps_duty_and_frequency() {
    let (mut pwm, handle) = SimPwm::new();
    pwm.on(50.0, 150.0).unwrap(); // below the window, over 100%
    let s = handle.snapshot();
    assert!(s.enabled);
    assert_eq!(s.freq_hz, 500.0);
    assert_eq!(s.duty_pct, 100.0);

    pwm.set_freq(1_000_000.0).unwrap();
    assert_eq!(handle.snapshot().freq_hz, 6_000.0);

    pwm.set_duty(-5.0).unwrap();
    assert_eq!(handle.snapshot().duty_pct, 0.0);
}

#[test]
fn sim_pwm_off_zeroes_the_duty() {
    let (mut pwm, handle) = SimPwm::new();
    pwm.on(1_000.0, 40.0).unwrap();
    pwm.off().unwrap();
    let s = handle.snapshot();
    assert!(!s.enabled);
    assert_eq!(s.duty_pct, 0.0);
}

#[test]
fn sim_board_limit_switch_is_steerable() {
    let (mut board, handle) = SimBoard::new();
    assert!(!board.limit_switch_thrown());
    handle.throw_limit();
    assert!(board.limit_switch_thrown());
    handle.release_limit();
    assert!(!board.limit_switch_thrown());

    board.led_toggle();
    board.led_toggle();
    assert_eq!(handle.led_toggles(), 2);
}
