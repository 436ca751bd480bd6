//! Loading dynamics requests and writing reports as JSON

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::propagation::{DynamicsOutput, DynamicsRequest, PropagationMode};

/// Output file of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicsReport {
    pub generated_at: String,
    pub mode: String,
    pub ltte: bool,
    pub n_bodies: usize,
    pub n_times: usize,
    #[serde(flatten)]
    pub output: DynamicsOutput,
}

impl DynamicsReport {
    pub fn new(request: &DynamicsRequest, output: DynamicsOutput) -> Self {
        let mode = match &request.mode {
            PropagationMode::Keplerian => "keplerian".to_string(),
            PropagationMode::Nbody(settings) => format!("nbody/{}", settings.integrator),
        };

        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            mode,
            ltte: request.ltte,
            n_bodies: output.bodies.len(),
            n_times: output.times.len(),
            output,
        }
    }
}

/// Load a dynamics request from JSON
pub fn load_request(path: impl AsRef<Path>) -> Result<DynamicsRequest> {
    let path = path.as_ref();
    log::info!("Loading request from {:?}", path);

    let file = File::open(path).with_context(|| format!("Failed to open request file: {:?}", path))?;

    let reader = BufReader::new(file);
    let request: DynamicsRequest =
        serde_json::from_reader(reader).with_context(|| format!("Failed to parse request JSON: {:?}", path))?;

    log::info!(
        "Loaded request: {} bodies, {} output times",
        request.masses.len(),
        request.times.len()
    );

    Ok(request)
}

/// Serialize a report to any writer
pub fn write_report_to(writer: impl Write, report: &DynamicsReport, pretty: bool) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(writer, report)?;
    } else {
        serde_json::to_writer(writer, report)?;
    }
    Ok(())
}

/// Write a report to a file, creating parent directories
pub fn write_report(path: impl AsRef<Path>, report: &DynamicsReport, pretty: bool) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }
    let file = File::create(path).with_context(|| format!("Failed to create output file: {:?}", path))?;

    let mut writer = BufWriter::new(file);
    write_report_to(&mut writer, report, pretty)?;
    writer.flush()?;

    log::info!("Wrote {} bodies x {} times to {:?}", report.n_bodies, report.n_times, path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::{DynamicsOrchestrator, OrbitParameters};

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("stellar-dynamics-{}-{}", std::process::id(), name))
    }

    fn request() -> DynamicsRequest {
        let orbit = OrbitParameters {
            sma: 4.0,
            ecc: 0.3,
            incl: 1.0,
            per0: 0.5,
            long_an: 0.0,
            mean_anom: 0.0,
        };
        DynamicsRequest::new(vec![1.0, 0.6], &[orbit], vec![0.0, 0.5, 1.0])
    }

    #[test]
    fn test_load_request() {
        let path = temp_path("request.json");
        std::fs::write(&path, serde_json::to_string(&request()).unwrap()).unwrap();

        let loaded = load_request(&path).unwrap();
        assert_eq!(loaded, request());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_request_errors_carry_context() {
        let missing = load_request(temp_path("missing.json")).unwrap_err();
        assert!(missing.to_string().contains("Failed to open request file"));

        let path = temp_path("broken.json");
        std::fs::write(&path, "{\"masses\": [1.0").unwrap();
        let broken = load_request(&path).unwrap_err();
        assert!(broken.to_string().contains("Failed to parse request JSON"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_report_floats_read_back_exactly() {
        let request = request();
        let mut output = DynamicsOrchestrator::new(request.clone()).unwrap().compute().unwrap();
        // Shortest round-trip form that needs correctly rounded parsing
        output.bodies[0].zs[0] = -0.42359381411690156;
        output.bodies[0].vzs[1] = 1.0 / 3.0;
        let report = DynamicsReport::new(&request, output.clone());

        let mut buffer = Vec::new();
        write_report_to(&mut buffer, &report, false).unwrap();
        let parsed: DynamicsReport = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(parsed.output.bodies[0].zs[0].to_bits(), (-0.42359381411690156f64).to_bits());
        assert_eq!(parsed.output, output);
    }

    #[test]
    fn test_write_report() {
        let request = request();
        let output = DynamicsOrchestrator::new(request.clone()).unwrap().compute().unwrap();
        let report = DynamicsReport::new(&request, output.clone());

        let path = temp_path("out").join("report.json");
        write_report(&path, &report, true).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["mode"], "keplerian");
        assert_eq!(value["n_times"], 3);
        assert_eq!(value["bodies"][1]["xs"].as_array().unwrap().len(), 3);
        assert!(value["bodies"][0].get("euler").is_none());

        let parsed: DynamicsReport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.output, output);

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }
}
