//! Agrilink CLI - Command-line interface
//!
//! Headless access to the field unit's link drivers: probe readings,
//! modem bring-up, and SMS submission for automation and bench testing.

use agrilink_core::{
    build_message, exit_code_description, format_phone_number, list_ports, AppConfig, ExitCodes,
    MeasurementRecord, MessageValues, ModemError, ModemLink, SampleObserver, SamplingAggregator,
    SendOutcome, SensorError, SensorLink, SerialLink, SerialLinkConfig, SmsError, SmsSender,
    SoilMeasurement,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

/// CLI output format
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON format for scripting
    Json,
    /// CSV datalog row
    Csv,
}

/// Agrilink CLI
#[derive(Parser, Debug)]
#[command(
    name = "agrilink",
    author = "Agrilink Team",
    version,
    about = "Soil probe and GSM link driver CLI",
    long_about = None
)]
struct Cli {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List available serial ports
    ListPorts {
        /// Show detailed info
        #[arg(short, long)]
        detailed: bool,
    },

    /// Take an averaged soil reading
    Read {
        /// RS-485 port (overrides config)
        #[arg(short, long)]
        port: Option<String>,

        /// Baud rate (overrides config)
        #[arg(short, long)]
        baud: Option<u32>,

        /// Samples to average (overrides config)
        #[arg(short, long)]
        samples: Option<usize>,

        /// Farmer ID for the record columns
        #[arg(long, default_value = "0000")]
        farmer_id: String,
    },

    /// Bring up the GSM modem and report its state
    ModemInit {
        /// Modem UART port (overrides config)
        #[arg(short, long)]
        port: Option<String>,

        /// Baud rate (overrides config)
        #[arg(short, long)]
        baud: Option<u32>,
    },

    /// Bring up the modem and send one SMS
    SendSms {
        /// Modem UART port (overrides config)
        #[arg(short, long)]
        port: Option<String>,

        /// Baud rate (overrides config)
        #[arg(short, long)]
        baud: Option<u32>,

        /// Recipient phone number (normalized before submission)
        #[arg(short, long)]
        to: String,

        /// Message body
        #[arg(short, long)]
        message: String,
    },

    /// Full field workflow: read the probe, fill the template, send the SMS
    Notify {
        /// Recipient phone number
        #[arg(short, long)]
        to: String,

        /// Template file with {placeholder} markers
        #[arg(long)]
        template: PathBuf,

        /// Farmer ID substituted into the template
        #[arg(long, default_value = "0000")]
        farmer_id: String,
    },
}

/// Prints sampling progress to stderr, keeping stdout clean for records.
struct StderrProgress;

impl SampleObserver for StderrProgress {
    fn on_sample(&mut self, index: usize, total: usize) {
        eprintln!("Sampling {index}/{total}...");
    }
}

fn serial_config(base: &SerialLinkConfig, port: Option<String>, baud: Option<u32>) -> SerialLinkConfig {
    let mut config = base.clone();
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(baud) = baud {
        config.baud_rate = baud;
    }
    config
}

fn print_measurement(m: &SoilMeasurement, record: &MeasurementRecord, format: OutputFormat) -> u8 {
    match format {
        OutputFormat::Text => {
            println!("Humidity:    {:.1} %RH", m.humidity);
            println!("Temperature: {:.1} C", m.temperature);
            println!("EC:          {:.0} uS/cm", m.ec);
            println!("pH:          {:.1}", m.ph);
            println!("Nitrogen:    {:.0} mg/kg", m.nitrogen);
            println!("Phosphorus:  {:.0} mg/kg", m.phosphorus);
            println!("Potassium:   {:.0} mg/kg", m.potassium);
        }
        OutputFormat::Json => match serde_json::to_string_pretty(m) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("JSON error: {e}");
                return ExitCodes::ERROR;
            }
        },
        OutputFormat::Csv => println!("{record}"),
    }
    ExitCodes::SUCCESS
}

fn sensor_exit_code(err: &SensorError) -> u8 {
    match err {
        SensorError::Timeout { .. } | SensorError::Frame(_) => ExitCodes::SENSOR_TIMEOUT,
        SensorError::NoValidSamples { .. } => ExitCodes::NO_VALID_SAMPLES,
        _ => ExitCodes::ERROR,
    }
}

fn sms_exit_code(result: Result<SendOutcome, SmsError>) -> u8 {
    match result {
        Ok(SendOutcome::Sent) => {
            println!("SMS sent");
            ExitCodes::SUCCESS
        }
        Ok(outcome) => {
            eprintln!("SMS failed: {outcome:?}");
            ExitCodes::SMS_FAILED
        }
        Err(SmsError::ModemNotReady) => {
            eprintln!("Modem not ready");
            ExitCodes::MODEM_NOT_READY
        }
        Err(SmsError::NotRegistered) => {
            eprintln!("Not registered on the network");
            ExitCodes::NOT_REGISTERED
        }
        Err(e) => {
            eprintln!("Transport error: {e}");
            ExitCodes::PORT_ERROR
        }
    }
}

async fn take_reading(
    config: &AppConfig,
    port: Option<String>,
    baud: Option<u32>,
    samples: Option<usize>,
) -> Result<SoilMeasurement, u8> {
    let serial = serial_config(&config.sensor_port, port, baud);
    let transport = SerialLink::open(serial).map_err(|e| {
        eprintln!("Could not open sensor port: {e}");
        ExitCodes::PORT_ERROR
    })?;

    let link = SensorLink::new(transport, config.sensor.clone());
    let samples = samples.unwrap_or(config.sensor.samples);
    let mut aggregator = SamplingAggregator::new(link);

    aggregator
        .take_averaged(samples, &mut StderrProgress)
        .await
        .map_err(|e| {
            eprintln!("Reading failed: {e}");
            sensor_exit_code(&e)
        })
}

async fn bring_up_modem(
    config: &AppConfig,
    port: Option<String>,
    baud: Option<u32>,
) -> Result<ModemLink<SerialLink>, u8> {
    let serial = serial_config(&config.modem_port, port, baud);
    let transport = SerialLink::open(serial).map_err(|e| {
        eprintln!("Could not open modem port: {e}");
        ExitCodes::PORT_ERROR
    })?;

    let mut modem = ModemLink::new(transport, config.modem.clone());
    match modem.init().await {
        Ok(()) => Ok(modem),
        Err(ModemError::NotResponding) => {
            eprintln!("Modem not responding");
            Err(ExitCodes::MODEM_NOT_READY)
        }
        Err(ModemError::SimNotReady { response }) => {
            eprintln!("SIM not ready: {response}");
            Err(ExitCodes::SIM_NOT_READY)
        }
        Err(e) => {
            eprintln!("Modem bring-up failed: {e}");
            Err(ExitCodes::PORT_ERROR)
        }
    }
}

async fn run(cli: Cli) -> u8 {
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {e}");
            return ExitCodes::CONFIG_ERROR;
        }
    };

    match cli.command {
        Commands::ListPorts { detailed } => match list_ports() {
            Ok(ports) => {
                for info in ports {
                    if detailed {
                        println!("{}: {:?}", info.port_name, info.port_type);
                    } else {
                        println!("{}", info.port_name);
                    }
                }
                ExitCodes::SUCCESS
            }
            Err(e) => {
                eprintln!("Could not list ports: {e}");
                ExitCodes::PORT_ERROR
            }
        },

        Commands::Read {
            port,
            baud,
            samples,
            farmer_id,
        } => match take_reading(&config, port, baud, samples).await {
            Ok(m) => {
                let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
                let record = MeasurementRecord::new(&farmer_id, &timestamp, m);
                print_measurement(&m, &record, cli.format)
            }
            Err(code) => code,
        },

        Commands::ModemInit { port, baud } => match bring_up_modem(&config, port, baud).await {
            Ok(modem) => {
                println!("Modem ready: {}", modem.ready());
                println!("Registered:  {}", modem.registered());
                match modem.signal_quality() {
                    Some(signal) => match signal.dbm() {
                        Some(dbm) => println!("Signal:      {dbm} dBm"),
                        None => println!("Signal:      unknown"),
                    },
                    None => println!("Signal:      unavailable"),
                }
                ExitCodes::SUCCESS
            }
            Err(code) => code,
        },

        Commands::SendSms {
            port,
            baud,
            to,
            message,
        } => match bring_up_modem(&config, port, baud).await {
            Ok(modem) => {
                let mut sender = SmsSender::new(modem);
                sms_exit_code(sender.send(&to, &message).await)
            }
            Err(code) => code,
        },

        Commands::Notify {
            to,
            template,
            farmer_id,
        } => {
            let template = match std::fs::read_to_string(&template) {
                Ok(text) => text,
                Err(e) => {
                    eprintln!("Could not read template {}: {e}", template.display());
                    return ExitCodes::INVALID_ARGS;
                }
            };

            let measurement = match take_reading(&config, None, None, None).await {
                Ok(m) => m,
                Err(code) => return code,
            };

            let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
            let body = build_message(
                &template,
                &MessageValues {
                    farmer_id: &farmer_id,
                    measurement: &measurement,
                    timestamp: &timestamp,
                },
            );
            eprintln!("To {}: {body}", format_phone_number(&to, &config.modem.country_code));

            match bring_up_modem(&config, None, None).await {
                Ok(modem) => {
                    let mut sender = SmsSender::new(modem);
                    sms_exit_code(sender.send(&to, &body).await)
                }
                Err(code) => code,
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Agrilink v{}", env!("CARGO_PKG_VERSION"));

    let verbose = cli.verbose;
    let code = run(cli).await;
    if verbose && code != ExitCodes::SUCCESS {
        eprintln!("Exit: {}", exit_code_description(code));
    }
    ExitCode::from(code)
}
