use crate::domain::{HafxError, HafxResult};
use crate::modules::traits::ThermalSpectrumSource;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use tracing::{debug, info};

/// Marker printed around the bridge's table so interpreter banners and
/// compile chatter can be discarded.
pub const BRIDGE_DELIMITER: &str = "*-**-**-**-**-**-**-**-**-**-*";

pub const DEFAULT_BRIDGE_SCRIPT: &str = "f_vth_bridge";

/// Arguments of the isothermal model: a uniform energy grid plus emission
/// measure (1e49 cm⁻³), temperature and relative abundance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThermalParameters {
    pub start_kev: f64,
    pub end_kev: f64,
    pub step_kev: f64,
    pub emission_measure: f64,
    pub plasma_temperature_kev: f64,
    pub relative_abundance: f64,
}

impl ThermalParameters {
    pub fn bridge_arguments(&self) -> [f64; 6] {
        [
            self.start_kev,
            self.end_kev,
            self.step_kev,
            self.emission_measure,
            self.plasma_temperature_kev,
            self.relative_abundance,
        ]
    }
}

/// Drives an external IDL interpreter over stdin and reads the thermal table
/// back from stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdlBridgeSource {
    executable: PathBuf,
    script_dir: PathBuf,
    script_name: String,
}

impl IdlBridgeSource {
    pub fn new(executable: impl Into<PathBuf>, script_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            script_dir: script_dir.into(),
            script_name: DEFAULT_BRIDGE_SCRIPT.to_string(),
        }
    }

    pub fn with_script_name(mut self, script_name: impl Into<String>) -> Self {
        self.script_name = script_name.into();
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    pub fn script_path(&self) -> PathBuf {
        self.script_dir.join(format!("{}.pro", self.script_name))
    }

    /// Interpreter input: compile the bridge, then print the table between
    /// two delimiter lines.
    pub fn command_script(&self, parameters: &ThermalParameters) -> String {
        let arguments = parameters
            .bridge_arguments()
            .iter()
            .map(|value| format!("{value:e}"))
            .collect::<Vec<_>>()
            .join(",");

        format!(
            ".compile {script}\nprint, '{delim}'\n{name}({arguments})\nprint, '{delim}'\nexit\n",
            script = self.script_path().display(),
            delim = BRIDGE_DELIMITER,
            name = self.script_name,
        )
    }

    fn run_interpreter(&self, input: &str) -> HafxResult<String> {
        let mut child = Command::new(&self.executable)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| {
                HafxError::io_system(
                    "IO.THERMAL_BRIDGE_SPAWN",
                    format!(
                        "failed to start thermal bridge '{}': {}",
                        self.executable.display(),
                        source
                    ),
                )
            })?;

        feed_stdin(&mut child, input)?;

        let output = child.wait_with_output().map_err(|source| {
            HafxError::io_system(
                "IO.THERMAL_BRIDGE_WAIT",
                format!("thermal bridge did not finish: {source}"),
            )
        })?;
        debug!(
            status = %output.status,
            stdout_bytes = output.stdout.len(),
            "thermal bridge exited"
        );

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Writes the command script and closes stdin. On failure the child is
/// killed and reaped before the error is returned.
fn feed_stdin(child: &mut Child, input: &str) -> HafxResult<()> {
    let Some(mut stdin) = child.stdin.take() else {
        return Ok(());
    };
    if let Err(source) = stdin.write_all(input.as_bytes()) {
        drop(stdin);
        let _ = child.kill();
        let _ = child.wait();
        return Err(HafxError::io_system(
            "IO.THERMAL_BRIDGE_STDIN",
            format!("failed to write thermal bridge input: {source}"),
        ));
    }
    Ok(())
}

impl ThermalSpectrumSource for IdlBridgeSource {
    fn thermal_flux(&self, parameters: &ThermalParameters) -> HafxResult<Vec<f64>> {
        info!(
            executable = %self.executable.display(),
            temperature_kev = parameters.plasma_temperature_kev,
            emission_measure = parameters.emission_measure,
            "computing thermal spectrum through bridge"
        );
        let transcript = self.run_interpreter(&self.command_script(parameters))?;
        let lines = extract_delimited_output(&transcript)?;
        parse_flat_table(&lines)
    }
}

/// Lines strictly between the first two delimiter lines of `transcript`.
pub fn extract_delimited_output(transcript: &str) -> HafxResult<Vec<&str>> {
    let lines: Vec<&str> = transcript.lines().collect();
    let mut markers = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.trim() == BRIDGE_DELIMITER)
        .map(|(index, _)| index);

    let (Some(start), Some(end)) = (markers.next(), markers.next()) else {
        return Err(HafxError::io_system(
            "IO.THERMAL_BRIDGE_TRANSCRIPT",
            "thermal bridge output is missing its delimiter lines; the script likely did not run",
        ));
    };

    let section: Vec<&str> = lines[start + 1..end]
        .iter()
        .copied()
        .filter(|line| !line.trim().is_empty())
        .collect();
    if section.is_empty() {
        return Err(HafxError::internal(
            "SYS.THERMAL_BRIDGE_EMPTY",
            "thermal bridge printed nothing between its delimiters",
        ));
    }
    Ok(section)
}

/// Flattens whitespace-separated numbers across all lines, row-major.
pub fn parse_flat_table(lines: &[&str]) -> HafxResult<Vec<f64>> {
    let mut values = Vec::new();
    for (line_index, line) in lines.iter().enumerate() {
        for token in line.split_whitespace() {
            let value = token.parse::<f64>().map_err(|source| {
                HafxError::invalid_input(
                    "INPUT.THERMAL_BRIDGE_VALUE",
                    format!("row {}: invalid value '{}': {}", line_index + 1, token, source),
                )
            })?;
            values.push(value);
        }
    }
    Ok(values)
}
