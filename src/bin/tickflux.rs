use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use time::OffsetDateTime;

use tickflux::market::synthetic_candles;
use tickflux::{
    write_thermostat, BinanceAsset, Client, ClientConfig, Encoding, Grouping, ThermostatSetting,
};

#[derive(Parser, Debug)]
#[command(name = "tickflux", version, about = "Write and read thermostat and candle data in InfluxDB")]
struct Cli {
    /// Organization (overrides INFLUXDB_ORG)
    #[arg(long, global = true)]
    org: Option<String>,

    /// Bucket (overrides INFLUXDB_BUCKET)
    #[arg(long, global = true)]
    bucket: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Probe the server's health endpoint
    Health,
    /// Write one thermostat reading
    WriteThermostat {
        #[arg(long)]
        user: String,
        #[arg(long)]
        avg: f64,
        #[arg(long)]
        max: f64,
        #[arg(long, value_enum, default_value_t = EncodingArg::Fluent)]
        encoding: EncodingArg,
    },
    /// Print the raw CSV of the last hour of a measurement
    QueryRaw {
        #[arg(long, default_value = "thermostat")]
        measurement: String,
    },
    /// Print decoded records from the last hour
    Query {
        #[arg(long, value_enum, default_value_t = KindArg::Thermostat)]
        kind: KindArg,
        #[arg(long, value_enum)]
        grouping: Option<GroupingArg>,
    },
    /// Write synthetic one-minute candles ending now
    SeedCandles {
        #[arg(short, long, default_value = "BTCUSDT")]
        symbol: String,
        #[arg(short, long, default_value_t = 10)]
        count: usize,
        #[arg(long, default_value_t = 60)]
        step_secs: u64,
    },
    /// Delete and recreate the configured bucket
    ResetBucket,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum EncodingArg {
    Line,
    Params,
    Fluent,
}

impl From<EncodingArg> for Encoding {
    fn from(value: EncodingArg) -> Self {
        match value {
            EncodingArg::Line => Encoding::LineProtocol,
            EncodingArg::Params => Encoding::Parameters,
            EncodingArg::Fluent => Encoding::Fluent,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum KindArg {
    Thermostat,
    Binance,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum GroupingArg {
    Identity,
    Timestamp,
}

impl From<GroupingArg> for Grouping {
    fn from(value: GroupingArg) -> Self {
        match value {
            GroupingArg::Identity => Grouping::Identity,
            GroupingArg::Timestamp => Grouping::Timestamp,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = ClientConfig::from_env().context("Failed to read InfluxDB settings")?;
    if let Some(org) = cli.org {
        config = config.org(org);
    }
    if let Some(bucket) = cli.bucket {
        config = config.bucket(bucket);
    }

    let client = Client::connect(config)
        .await
        .context("Failed to connect to InfluxDB")?;

    match cli.command {
        Commands::Health => {
            let health = client.health().await?;
            println!(
                "{} {} {}",
                health.name,
                health.status,
                health.version.unwrap_or_default()
            );
        }
        Commands::WriteThermostat {
            user,
            avg,
            max,
            encoding,
        } => {
            let setting = ThermostatSetting::new(user, avg, max);
            let mut writer = client.write_api();
            write_thermostat(&mut writer, &setting, encoding.into())
                .await
                .context("Failed to write thermostat reading")?;
            info!("Wrote {:?}", setting);
        }
        Commands::QueryRaw { measurement } => {
            let body = client.query_api().recent_raw(&measurement).await?;
            print!("{body}");
        }
        Commands::Query { kind, grouping } => {
            let mut api = client.query_api();
            if let Some(grouping) = grouping {
                api = api.with_grouping(grouping.into());
            }
            match kind {
                KindArg::Thermostat => {
                    for (key, setting) in api.recent::<ThermostatSetting>().await? {
                        println!(
                            "{} user={} avg={} max={}",
                            key.time, setting.user, setting.avg, setting.max
                        );
                    }
                }
                KindArg::Binance => {
                    for asset in api.recent::<BinanceAsset>().await?.into_values() {
                        println!("{asset}");
                    }
                }
            }
        }
        Commands::SeedCandles {
            symbol,
            count,
            step_secs,
        } => {
            let candles = synthetic_candles(
                &symbol,
                count,
                OffsetDateTime::now_utc(),
                Duration::from_secs(step_secs),
            )
            .context("Invalid candle range")?;
            let mut writer = client.write_api();
            for candle in &candles {
                writer.write(candle)?;
            }
            writer.flush().await.context("Failed to write candles")?;
            info!("Wrote {} candles for {}", candles.len(), symbol);
        }
        Commands::ResetBucket => {
            let bucket = client.admin_api().reset_bucket().await?;
            println!("{} {}", bucket.name, bucket.id);
        }
    }

    Ok(())
}
