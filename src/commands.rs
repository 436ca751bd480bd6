use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use stellar_dynamics::data::{load_request, write_report, write_report_to, DynamicsReport};
use stellar_dynamics::propagation::{
    DynamicsOrchestrator, DynamicsRequest, IntegratorType, NBodySettings, PropagationMode,
};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Keplerian,
    Nbody,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Request JSON file
    #[arg(long, short)]
    pub input: PathBuf,
    /// Output JSON file (stdout when omitted)
    #[arg(long, short)]
    pub output: Option<PathBuf>,
    /// Pretty-print the output JSON
    #[arg(long)]
    pub pretty: bool,
    /// Override the propagation mode of the request
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,
    /// Override the N-body integrator (dopri5, rk4, leapfrog)
    #[arg(long)]
    pub integrator: Option<String>,
    /// Override the N-body step size
    #[arg(long)]
    pub step_size: Option<f64>,
    /// Override the N-body error tolerance
    #[arg(long)]
    pub tolerance: Option<f64>,
    /// Enable the 1PN relativistic correction in N-body mode
    #[arg(long)]
    pub gr: bool,
    /// Apply light travel time effects
    #[arg(long)]
    pub ltte: bool,
    /// Report Roche/Euler elements (needs rotation_periods in the request)
    #[arg(long)]
    pub roche_euler: bool,
    /// Masses in solar masses, lengths in solar radii, times in days
    #[arg(long)]
    pub solar_units: bool,
    /// Hide the progress bar
    #[arg(long)]
    pub quiet: bool,
}

impl RunArgs {
    /// Fold command line overrides into the loaded request
    fn apply(&self, mut request: DynamicsRequest) -> DynamicsRequest {
        let nbody_overrides =
            self.integrator.is_some() || self.step_size.is_some() || self.tolerance.is_some() || self.gr;

        match self.mode {
            Some(ModeArg::Keplerian) => request.mode = PropagationMode::Keplerian,
            Some(ModeArg::Nbody) if matches!(request.mode, PropagationMode::Keplerian) => {
                request.mode = PropagationMode::Nbody(NBodySettings::default());
            }
            _ => {}
        }

        if let PropagationMode::Nbody(settings) = &mut request.mode {
            if let Some(name) = &self.integrator {
                settings.integrator = name.clone();
            }
            if let Some(step_size) = self.step_size {
                settings.step_size = step_size;
            }
            if let Some(tolerance) = self.tolerance {
                settings.tolerance = tolerance;
            }
            settings.gr |= self.gr;
        } else if nbody_overrides {
            log::warn!("N-body options ignored in Keplerian mode");
        }

        request.ltte |= self.ltte;
        request.return_roche_euler |= self.roche_euler;
        if self.solar_units {
            request = request.with_solar_units();
        }
        request
    }
}

pub fn run(args: RunArgs) -> Result<()> {
    let request = args.apply(load_request(&args.input)?);
    let orchestrator = DynamicsOrchestrator::new(request.clone()).context("Invalid dynamics request")?;

    let progress = if args.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(request.times.len() as u64)
    };
    progress.set_style(
        ProgressStyle::with_template("{elapsed_precise} {bar:40.cyan/blue} {pos}/{len} {percent}% ETA {eta_precise}")?
            .progress_chars("##-"),
    );

    let output = orchestrator
        .compute_with_progress(&mut |done, _| progress.set_position(done as u64))
        .context("Dynamics computation failed")?;
    progress.finish_and_clear();

    let report = DynamicsReport::new(&request, output);
    match &args.output {
        Some(path) => write_report(path, &report, args.pretty)?,
        None => {
            let stdout = std::io::stdout();
            write_report_to(stdout.lock(), &report, args.pretty)?;
            println!();
        }
    }

    Ok(())
}

/// Print the available N-body integrators
pub fn list_integrators() {
    for integrator in IntegratorType::all() {
        let marker = if *integrator == IntegratorType::default() { " (default)" } else { "" };
        println!("{:<10} {}{}", integrator.name(), integrator.description(), marker);
    }
}
