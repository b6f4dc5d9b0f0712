use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn run_spectro(args: &[&str]) -> Output {
    let binary_path = env!("CARGO_BIN_EXE_spectro");
    Command::new(binary_path)
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("spectro command should run")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("temp paths should be UTF-8")
}

fn write_file(path: &Path, content: &str) {
    fs::write(path, content).expect("fixture file should be written");
}

fn gaussian_csv(len: usize, center: f64, sigma: f64, height: f64, offset: f64) -> String {
    (0..len)
        .map(|i| {
            let x = i as f64;
            let y = offset + height * (-(x - center).powi(2) / (2.0 * sigma * sigma)).exp();
            format!("{}, {}\n", 500.0 + 0.5 * x, y)
        })
        .collect()
}

fn read_json(path: &Path) -> Value {
    let source = fs::read_to_string(path).expect("output should exist");
    serde_json::from_str(&source).expect("output should be JSON")
}

fn data_values(value: &Value) -> Vec<f64> {
    value["DataValues"]
        .as_array()
        .expect("DataValues array")
        .iter()
        .map(|v| v.as_f64().expect("number"))
        .collect()
}

#[test]
fn peaks_command_prints_a_table() {
    let temp = TempDir::new().expect("tempdir should be created");
    let input = temp.path().join("lamp.csv");
    let output = temp.path().join("lamp.json");
    write_file(&input, &gaussian_csv(300, 150.0, 12.0, 8000.0, 0.0));

    let result = run_spectro(&[
        "peaks",
        "--input",
        path_arg(&input),
        "--output",
        path_arg(&output),
    ]);
    assert!(result.status.success(), "stderr: {}", String::from_utf8_lossy(&result.stderr));

    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("# lamp: 1 peak(s)"), "stdout: {stdout}");
    assert!(stdout.contains("\t575.000\t"), "stdout: {stdout}");

    let saved = read_json(&output);
    assert_eq!(saved["Name"], "lamp");
    let peaks = saved["Peaks"].as_array().expect("Peaks array");
    assert_eq!(peaks.len(), 1);
    assert_eq!(peaks[0]["PeakIndex"], 150);
}

#[test]
fn dark_correct_subtracts_the_stored_frame() {
    let temp = TempDir::new().expect("tempdir should be created");
    let input = temp.path().join("raw.csv");
    let dark = temp.path().join("dark.csv");
    let output = temp.path().join("corrected.json");
    write_file(&input, "500, 110\n501, 210\n502, 310\n503, 410\n");
    write_file(&dark, "10\n10\n10\n10\n");

    let result = run_spectro(&[
        "dark-correct",
        "--input",
        path_arg(&input),
        "--dark",
        path_arg(&dark),
        "--output",
        path_arg(&output),
    ]);
    assert!(result.status.success(), "stderr: {}", String::from_utf8_lossy(&result.stderr));

    let saved = read_json(&output);
    assert_eq!(saved["Name"], "raw_darkCorrected");
    assert_eq!(data_values(&saved), vec![100.0, 200.0, 300.0, 400.0]);
}

#[test]
fn baseline_command_honours_the_processing_config() {
    let temp = TempDir::new().expect("tempdir should be created");
    let input = temp.path().join("flat.csv");
    let config = temp.path().join("processing.json");
    let output = temp.path().join("flat_removed.csv");
    let curve = temp.path().join("flat_baseline.json");
    let rows: String = (0..128).map(|i| format!("{}, 125\n", 400 + i)).collect();
    write_file(&input, &rows);
    write_file(&config, r#"{ "baseline": { "lambda": 1e6, "itermax": 10 } }"#);

    let result = run_spectro(&[
        "baseline",
        "--config",
        path_arg(&config),
        "--input",
        path_arg(&input),
        "--output",
        path_arg(&output),
        "--baseline-output",
        path_arg(&curve),
    ]);
    assert!(result.status.success(), "stderr: {}", String::from_utf8_lossy(&result.stderr));

    let baseline = data_values(&read_json(&curve));
    assert_eq!(baseline.len(), 128);
    assert!(baseline.iter().all(|value| (value - 125.0).abs() < 1.0e-3));
    let removed = fs::read_to_string(&output).expect("output should exist");
    assert_eq!(removed.lines().count(), 128);
}

#[test]
fn derivative_and_smooth_write_named_spectra() {
    let temp = TempDir::new().expect("tempdir should be created");
    let input = temp.path().join("line.json");
    write_file(
        &input,
        r#"{"Id": 9, "Name": "line", "Enabled": true,
            "Wavelengths": [1, 2, 3, 4, 5, 6, 7, 8, 9, 10],
            "DataValues": [2, 4, 6, 8, 10, 12, 14, 16, 18, 20]}"#,
    );
    let first = temp.path().join("first.json");
    let smoothed = temp.path().join("smoothed.json");

    let result = run_spectro(&[
        "derivative",
        "--input",
        path_arg(&input),
        "--output",
        path_arg(&first),
        "--order",
        "1",
    ]);
    assert!(result.status.success(), "stderr: {}", String::from_utf8_lossy(&result.stderr));
    let saved = read_json(&first);
    assert_eq!(saved["Name"], "line_1st_derivative");
    assert!(data_values(&saved).iter().all(|value| (value - 2.0).abs() < 1.0e-9));

    let result = run_spectro(&[
        "smooth",
        "--input",
        path_arg(&input),
        "--output",
        path_arg(&smoothed),
        "--kind",
        "box-car",
        "--half-window",
        "1",
    ]);
    assert!(result.status.success(), "stderr: {}", String::from_utf8_lossy(&result.stderr));
    let saved = read_json(&smoothed);
    assert_eq!(saved["Name"], "line_smoothed");
    assert_eq!(data_values(&saved)[4], 10.0);
}

#[test]
fn fft_smoothing_keeps_the_requested_bins() {
    let temp = TempDir::new().expect("tempdir should be created");
    let input = temp.path().join("wave.csv");
    let output = temp.path().join("wave_smooth.json");
    let rows: String = (0..32)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / 32.0;
            format!("{}, {}\n", 600 + i, 50.0 + 10.0 * phase.cos() + 4.0 * (12.0 * phase).cos())
        })
        .collect();
    write_file(&input, &rows);

    let result = run_spectro(&[
        "smooth",
        "--input",
        path_arg(&input),
        "--output",
        path_arg(&output),
        "--kind",
        "fft",
        "--fft-degree",
        "2",
    ]);
    assert!(result.status.success(), "stderr: {}", String::from_utf8_lossy(&result.stderr));

    let saved = read_json(&output);
    assert_eq!(saved["Name"], "wave_smoothed");
    for (i, value) in data_values(&saved).iter().enumerate() {
        let phase = 2.0 * std::f64::consts::PI * i as f64 / 32.0;
        let expected = 50.0 + 10.0 * phase.cos();
        assert!((value - expected).abs() < 1.0e-6, "value[{i}] = {value}, expected {expected}");
    }

    let result = run_spectro(&[
        "smooth",
        "--input",
        path_arg(&input),
        "--output",
        path_arg(&output),
        "--kind",
        "fft",
        "--fft-degree",
        "0",
    ]);
    assert_eq!(result.status.code(), Some(5));
}

#[test]
fn acquire_writes_processed_frames() {
    let temp = TempDir::new().expect("tempdir should be created");
    let device = temp.path().join("device.json");
    let out_dir = temp.path().join("frames");
    write_file(
        &device,
        r#"{
          "family": "Simulated",
          "model": "bench",
          "pixelCount": 256,
          "calibration": { "coefficients": [500.0, 0.5, 0.0, 0.0], "xMin": 3, "xMax": 252 },
          "simulation": {
            "darkLevel": 600,
            "referenceIntegrationTime": 100,
            "lines": [ { "center": 560.0, "height": 15000.0, "sigma": 3.0 } ]
          }
        }"#,
    );

    let result = run_spectro(&[
        "acquire",
        "--device",
        path_arg(&device),
        "--output-dir",
        path_arg(&out_dir),
        "--frames",
        "2",
        "--integration-time",
        "100",
        "--dark-scan",
        "--process",
        "--name",
        "bench",
    ]);
    assert!(result.status.success(), "stderr: {}", String::from_utf8_lossy(&result.stderr));

    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("# bench_1: 1 peak(s)"), "stdout: {stdout}");
    assert!(stdout.contains("# bench_2: 1 peak(s)"), "stdout: {stdout}");
    for name in ["bench_1", "bench_2"] {
        let saved = read_json(&out_dir.join(format!("{name}.json")));
        assert_eq!(saved["Name"], name);
        assert_eq!(data_values(&saved).len(), 250);
        assert_eq!(saved["Peaks"].as_array().expect("Peaks array").len(), 1);
    }
}

#[test]
fn missing_input_exits_with_io_code() {
    let temp = TempDir::new().expect("tempdir should be created");
    let missing = temp.path().join("missing.csv");
    let result = run_spectro(&["peaks", "--input", path_arg(&missing)]);

    assert_eq!(result.status.code(), Some(6));
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("ERROR: [IO.SPECTRUM]"), "stderr: {stderr}");
    assert!(stderr.contains("FATAL EXIT CODE: 6"), "stderr: {stderr}");
}

#[test]
fn invalid_arguments_are_usage_errors() {
    let result = run_spectro(&["derivative", "--order"]);
    assert_eq!(result.status.code(), Some(3));

    let temp = TempDir::new().expect("tempdir should be created");
    let input = temp.path().join("x.csv");
    let output = temp.path().join("y.csv");
    write_file(&input, "1, 1\n2, 2\n3, 3\n");
    let result = run_spectro(&[
        "derivative",
        "--input",
        path_arg(&input),
        "--output",
        path_arg(&output),
        "--half-window",
        "1",
        "--poly-degree",
        "4",
    ]);
    assert_eq!(result.status.code(), Some(5));
    assert!(!output.exists());
}
