use super::CliError;
use super::helpers::*;
use anyhow::Context;
use hafx_core::modules::SimulationContainer;
use hafx_core::modules::serialization::format_scientific;
use hafx_core::modules::thermal::IdlBridgeSource;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

#[derive(clap::Args)]
#[command(group(clap::ArgGroup::new("source").required(true).args(["spectrum", "idl"])))]
pub(super) struct SimulateArgs {
    /// Detector stack description (JSON)
    #[arg(long)]
    stack: PathBuf,

    /// Spectrum table with columns: edge_low edge_high thermal nonthermal
    #[arg(long)]
    spectrum: Option<PathBuf>,

    /// IDL interpreter used to compute a thermal-only spectrum
    #[arg(long, requires_all = ["bridge_dir", "temperature_kev", "emission_measure"])]
    idl: Option<PathBuf>,

    /// Directory holding the thermal bridge script
    #[arg(long)]
    bridge_dir: Option<PathBuf>,

    /// Plasma temperature for the thermal bridge
    #[arg(long)]
    temperature_kev: Option<f64>,

    /// Emission measure for the thermal bridge, in 1e49 cm^-3
    #[arg(long)]
    emission_measure: Option<f64>,

    /// Relative abundance for the thermal bridge
    #[arg(long, default_value_t = 1.0)]
    relative_abundance: f64,

    /// GOES class used to label the records
    #[arg(long)]
    goes_class: Option<String>,

    /// Absorber thickness in cm; repeat or comma-separate to sweep
    #[arg(long, required = true, num_args = 1.., value_delimiter = ',')]
    thickness: Vec<f64>,

    /// Output directory (defaults to the configured save_dir)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Record name prefix
    #[arg(long, default_value = "")]
    prefix: String,

    /// Instrument configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct AreaArgs {
    /// Saved simulation record (.npz)
    #[arg(long)]
    record: PathBuf,

    /// Trigger-band count-rate limit; 0 disables gating
    #[arg(long, default_value_t = 0.0)]
    cps_threshold: f64,

    /// Instrument configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct InspectArgs {
    /// Saved simulation record (.npz)
    #[arg(long)]
    record: PathBuf,

    /// Instrument configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit the summary as JSON
    #[arg(long)]
    json: bool,
}

pub(super) fn run_simulate_command(args: SimulateArgs) -> Result<i32, CliError> {
    let config = load_config(args.config.as_deref())?;
    let stack = load_stack(&args.stack, &config)?;

    let source = match (args.spectrum, args.idl) {
        (Some(path), _) => SpectrumSource::Table(path),
        (None, Some(executable)) => {
            let (Some(bridge_dir), Some(temperature_kev), Some(emission_measure)) =
                (args.bridge_dir, args.temperature_kev, args.emission_measure)
            else {
                return Err(CliError::Usage(
                    "--idl needs --bridge-dir, --temperature-kev and --emission-measure"
                        .to_string(),
                ));
            };
            SpectrumSource::Bridge {
                source: IdlBridgeSource::new(executable, bridge_dir),
                parameters: bridge_parameters(
                    &config,
                    temperature_kev,
                    emission_measure,
                    args.relative_abundance,
                ),
            }
        }
        (None, None) => {
            return Err(CliError::Usage(
                "one of --spectrum or --idl is required".to_string(),
            ));
        }
    };
    let spectrum = source.load(args.goes_class)?;
    let out_dir = args.out_dir.unwrap_or_else(|| config.save_dir.clone());

    for thickness in &args.thickness {
        let mut container =
            SimulationContainer::with_configuration(config.clone(), *thickness, spectrum.clone())
                .map_err(CliError::Compute)?;
        container.simulate(&stack).map_err(CliError::Compute)?;
        let path = container
            .save(&out_dir, &args.prefix)
            .map_err(CliError::Compute)?;
        println!("{}", path.display());
    }

    info!(
        records = args.thickness.len(),
        out_dir = %out_dir.display(),
        "simulation sweep finished"
    );
    Ok(0)
}

pub(super) fn run_area_command(args: AreaArgs) -> Result<i32, CliError> {
    let config = load_config(args.config.as_deref())?;
    let container = load_record(&args.record, &config)?;
    let area = container
        .compute_effective_area(args.cps_threshold)
        .map_err(CliError::Compute)?;
    let energies = container
        .flare_spectrum()
        .map(|spectrum| spectrum.energies().to_vec())
        .unwrap_or_default();

    let mut stdout = std::io::stdout().lock();
    for (energy, area) in energies.iter().zip(&area) {
        writeln!(stdout, "{energy}\t{area}").context("failed to write effective area")?;
    }
    Ok(0)
}

#[derive(Debug, Serialize)]
struct RecordSummary {
    label: String,
    state: String,
    absorber_thickness_cm: f64,
    goes_class: Option<String>,
    energy_bins: usize,
    energy_min_kev: f64,
    energy_max_kev: f64,
    trigger_band_rate_cps: f64,
}

pub(super) fn run_inspect_command(args: InspectArgs) -> Result<i32, CliError> {
    let config = load_config(args.config.as_deref())?;
    let container = load_record(&args.record, &config)?;
    let Some(spectrum) = container.flare_spectrum() else {
        return Err(CliError::Usage(format!(
            "record '{}' holds no spectrum",
            args.record.display()
        )));
    };

    let summary = RecordSummary {
        label: args
            .record
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default(),
        state: container.state().to_string(),
        absorber_thickness_cm: container.absorber_thickness().unwrap_or_default(),
        goes_class: spectrum.goes_class().map(str::to_string),
        energy_bins: spectrum.bin_count(),
        energy_min_kev: spectrum.energies().first(),
        energy_max_kev: spectrum.energies().last(),
        trigger_band_rate_cps: container
            .trigger_band_count_rate()
            .map_err(CliError::Compute)?,
    };

    if args.json {
        let rendered =
            serde_json::to_string_pretty(&summary).context("failed to render record summary")?;
        println!("{rendered}");
        return Ok(0);
    }

    println!("label: {}", summary.label);
    println!("state: {}", summary.state);
    println!(
        "absorber_thickness_cm: {}",
        format_scientific(summary.absorber_thickness_cm, 3)
    );
    println!(
        "goes_class: {}",
        summary.goes_class.as_deref().unwrap_or("none")
    );
    println!("energy_bins: {}", summary.energy_bins);
    println!(
        "energy_range_kev: {} - {}",
        summary.energy_min_kev, summary.energy_max_kev
    );
    println!("trigger_band_rate_cps: {}", summary.trigger_band_rate_cps);
    Ok(0)
}
