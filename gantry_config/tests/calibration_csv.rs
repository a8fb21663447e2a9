use gantry_config::load_calibration_csv;
use std::io::Write;

fn write_csv(contents: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().expect("temp file");
    f.write_all(contents.as_bytes()).expect("write csv");
    f
}

#[test]
fn loads_slope_and_offset() {
    let f = write_csv(
        "kind,key,value\n\
         thermocouple,slope,1.456355556\n\
         thermocouple,offset,-120.713597\n",
    );
    let cal = load_calibration_csv(f.path()).expect("calibration loads");
    assert!((cal.slope - 1.456_355_556).abs() < 1e-9);
    assert!((cal.offset + 120.713_597).abs() < 1e-9);
}

#[test]
fn rows_for_other_kinds_are_ignored() {
    let f = write_csv(
        "kind,key,value\n\
         bed,slope,9.9\n\
         thermocouple,slope,2.0\n\
         thermocouple,offset,0.5\n",
    );
    let cal = load_calibration_csv(f.path()).expect("calibration loads");
    assert_eq!(cal.slope, 2.0);
    assert_eq!(cal.offset, 0.5);
}

#[test]
fn missing_offset_row_is_an_error() {
    let f = write_csv(
        "kind,key,value\n\
         thermocouple,slope,2.0\n",
    );
    let err = load_calibration_csv(f.path()).expect_err("must fail");
    assert!(err.to_string().contains("offset"));
}

#[test]
fn unparseable_value_is_an_error() {
    let f = write_csv(
        "kind,key,value\n\
         thermocouple,slope,not-a-number\n\
         thermocouple,offset,0.0\n",
    );
    assert!(load_calibration_csv(f.path()).is_err());
}
