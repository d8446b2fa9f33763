use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use cob_core::config::MAX_DURATION_MINUTES;
use cob_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cobctl")]
#[command(about = "Carbs and insulin on board calculator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override entries file (JSON array or JSON Lines)
    #[arg(long, global = true)]
    entries: Option<PathBuf>,

    /// Evaluation time (RFC 3339), defaults to now
    #[arg(long, global = true)]
    at: Option<DateTime<Utc>>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current carbs and insulin on board (default)
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Project COB/IOB forward in fixed steps
    Project {
        /// Number of points (defaults to config)
        #[arg(long, allow_negative_numbers = true)]
        steps: Option<i64>,

        /// Minutes between points (defaults to config)
        #[arg(long, allow_negative_numbers = true)]
        step_minutes: Option<i64>,

        /// Also write the projection to a CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Predict glucose at a horizon from the current on-board values
    Predict {
        /// Current glucose (mmol/L)
        #[arg(long)]
        glucose: f64,

        /// Horizon in minutes
        #[arg(long, default_value_t = DEFAULT_HORIZON_MINUTES)]
        horizon: i64,
    },

    /// Suggest a bolus for a meal and/or correction
    Bolus {
        /// Carbs about to be eaten (g)
        #[arg(long, default_value_t = 0.0)]
        carbs: f64,

        /// Current glucose (mmol/L)
        #[arg(long)]
        glucose: f64,

        /// Target glucose (mmol/L)
        #[arg(long)]
        target: f64,
    },

    /// Show the insulin activity curve of one logged dose
    Timeline {
        /// Entry id
        #[arg(long)]
        id: String,

        /// Hours to cover from the dose time (at most 24)
        #[arg(long, default_value_t = 4.0, allow_negative_numbers = true)]
        hours: f64,
    },

    /// Show or change model parameters
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the active configuration
    Show,

    /// Change one or more model parameters
    Set(SetArgs),
}

#[derive(Args)]
struct SetArgs {
    /// Carb absorption window (minutes)
    #[arg(long, allow_negative_numbers = true)]
    carb_absorption: Option<f64>,

    /// Insulin action window (minutes)
    #[arg(long, allow_negative_numbers = true)]
    insulin_action: Option<f64>,

    /// Carb absorption peak (minutes)
    #[arg(long, allow_negative_numbers = true)]
    carb_peak: Option<f64>,

    /// Insulin activity peak (minutes)
    #[arg(long, allow_negative_numbers = true)]
    insulin_peak: Option<f64>,

    /// mmol/L per gram of carbs on board
    #[arg(long, allow_negative_numbers = true)]
    carb_factor: Option<f64>,

    /// mmol/L per unit of insulin on board
    #[arg(long, allow_negative_numbers = true)]
    insulin_factor: Option<f64>,
}

impl From<SetArgs> for ConfigUpdate {
    fn from(args: SetArgs) -> Self {
        ConfigUpdate {
            carb_absorption_minutes: args.carb_absorption,
            insulin_action_minutes: args.insulin_action,
            carb_peak_minutes: args.carb_peak,
            insulin_peak_minutes: args.insulin_peak,
            carb_to_glucose_factor: args.carb_factor,
            insulin_to_glucose_factor: args.insulin_factor,
        }
    }
}

fn main() -> Result<()> {
    // Initialize logging
    cob_core::logging::init();

    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(Config::default_config_path);
    let config = load_config(&config_path)?;
    let entries_path = cli
        .entries
        .unwrap_or_else(|| config.data.entries_path.clone());
    let now = cli.at.unwrap_or_else(Utc::now);

    match cli.command {
        Some(Commands::Status { json }) => cmd_status(&config, &entries_path, now, json),
        Some(Commands::Project {
            steps,
            step_minutes,
            csv,
        }) => cmd_project(&config, &entries_path, now, steps, step_minutes, csv),
        Some(Commands::Predict { glucose, horizon }) => {
            cmd_predict(&config, &entries_path, now, glucose, horizon)
        }
        Some(Commands::Bolus {
            carbs,
            glucose,
            target,
        }) => cmd_bolus(&config, &entries_path, now, carbs, glucose, target),
        Some(Commands::Timeline { id, hours }) => {
            cmd_timeline(&config, &entries_path, &id, hours)
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Show => cmd_config_show(&config, &config_path),
            ConfigAction::Set(args) => cmd_config_set(config, &config_path, args.into()),
        },
        None => cmd_status(&config, &entries_path, now, false),
    }
}

fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load_from(path)
    } else {
        tracing::info!("No config file found at {:?}, using defaults", path);
        Ok(Config::default())
    }
}

fn cmd_status(config: &Config, entries_path: &Path, now: DateTime<Utc>, json: bool) -> Result<()> {
    let entries = load_entries(entries_path)?;
    let status = compute_status(&entries, &config.model, now);

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    display_status(&status);
    Ok(())
}

fn cmd_project(
    config: &Config,
    entries_path: &Path,
    now: DateTime<Utc>,
    steps: Option<i64>,
    step_minutes: Option<i64>,
    csv: Option<PathBuf>,
) -> Result<()> {
    let entries = load_entries(entries_path)?;
    let steps = steps.unwrap_or(config.projection.steps);
    let step_minutes = step_minutes.unwrap_or(config.projection.step_minutes);

    let points = project(&entries, &config.model, now, steps, step_minutes);

    println!("{:<27} {:>8} {:>8}", "time", "cob (g)", "iob (u)");
    for point in &points {
        println!(
            "{:<27} {:>8.1} {:>8.2}",
            point.time.to_rfc3339(),
            point.cob,
            point.iob
        );
    }

    if let Some(path) = csv {
        write_projection_csv(&path, &points)?;
        println!("\n✓ Wrote {} points to {}", points.len(), path.display());
    }

    Ok(())
}

fn cmd_predict(
    config: &Config,
    entries_path: &Path,
    now: DateTime<Utc>,
    glucose: f64,
    horizon: i64,
) -> Result<()> {
    let entries = load_entries(entries_path)?;
    let prediction = predict_glucose(glucose, &entries, &config.model, now, horizon);

    println!(
        "Predicted glucose in {} min: {:.1} mmol/L ({:?})",
        prediction.horizon_minutes, prediction.predicted_glucose, prediction.trend
    );
    println!("  Now: {:.1} mmol/L", prediction.current_glucose);
    println!(
        "  Carbs:   {:+.2} mmol/L ({:.1} g on board, {:.1} g at horizon)",
        prediction.factors.carb_contribution, prediction.active_cob, prediction.future_cob
    );
    println!(
        "  Insulin: {:+.2} mmol/L ({:.2} u on board, {:.2} u at horizon)",
        prediction.factors.insulin_contribution, prediction.active_iob, prediction.future_iob
    );
    println!("  Confidence: {:.0}%", prediction.confidence * 100.0);

    Ok(())
}

fn cmd_bolus(
    config: &Config,
    entries_path: &Path,
    now: DateTime<Utc>,
    carbs: f64,
    glucose: f64,
    target: f64,
) -> Result<()> {
    let entries = load_entries(entries_path)?;
    let status = compute_status(&entries, &config.model, now);
    let units = recommend_bolus(carbs, glucose, target, status.insulin_on_board, &config.model);

    println!("Suggested bolus: {:.2} u", units);
    println!("  Insulin on board: {:.2} u", status.insulin_on_board);
    Ok(())
}

fn cmd_timeline(config: &Config, entries_path: &Path, id: &str, hours: f64) -> Result<()> {
    let minutes = hours * 60.0;
    if !(0.0..=MAX_DURATION_MINUTES).contains(&minutes) {
        return Err(Error::Other(format!(
            "--hours must be between 0 and {}, got {}",
            MAX_DURATION_MINUTES / 60.0,
            hours
        )));
    }

    let entries = load_entries(entries_path)?;
    let entry = cob_core::entries::find_entry(&entries, id)
        .ok_or_else(|| Error::Other(format!("No entry with id {}", id)))?;

    let minutes = minutes.round() as i64;
    let timeline = insulin_timeline(entry, &config.model, minutes);

    println!("Insulin activity for {} ({:.2} u)", entry.id, entry.effective_insulin());
    for point in &timeline {
        println!(
            "  {}  {:>6.2} u  {:>5.1}%{}",
            point.time.to_rfc3339(),
            point.remaining_units,
            point.percentage_remaining,
            if point.is_peak { "  ← peak" } else { "" }
        );
    }

    Ok(())
}

fn cmd_config_show(config: &Config, config_path: &Path) -> Result<()> {
    let model = &config.model;
    println!("Config: {}", config_path.display());
    println!("  carb_absorption_minutes   = {}", model.carb_absorption_minutes);
    println!("  carb_peak_minutes         = {}", model.carb_peak_minutes);
    println!("  insulin_action_minutes    = {}", model.insulin_action_minutes);
    println!("  insulin_peak_minutes      = {}", model.insulin_peak_minutes);
    println!("  carb_to_glucose_factor    = {}", model.carb_to_glucose_factor);
    println!("  insulin_to_glucose_factor = {}", model.insulin_to_glucose_factor);
    println!(
        "  projection                = {} x {} min",
        config.projection.steps, config.projection.step_minutes
    );
    println!("  entries                   = {}", config.data.entries_path.display());
    Ok(())
}

fn cmd_config_set(mut config: Config, config_path: &Path, update: ConfigUpdate) -> Result<()> {
    if update.is_empty() {
        println!("Nothing to change.");
        return Ok(());
    }

    let store = ConfigStore::global();
    store.replace(config.model.clone())?;
    config.model = store.update(&update)?;
    config.save_to(config_path)?;

    println!("✓ Configuration updated");
    cmd_config_show(&config, config_path)
}

fn display_status(status: &CobStatus) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  ON BOARD @ {}", status.evaluated_at.format("%Y-%m-%d %H:%M UTC"));
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!(
        "  Carbs:   {:.1} g ({})",
        status.current_cob,
        status.cob_level.description()
    );
    println!(
        "  Insulin: {:.2} u ({})",
        status.insulin_on_board,
        describe_insulin_activity(status)
    );
    println!("  Glucose impact: {:+.2} mmol/L", status.estimated_glucose_impact);
    println!("  Clear in: {:.0} min", status.time_to_zero_minutes);

    if !status.active_entries.is_empty() {
        println!();
        for active in &status.active_entries {
            let label = if active.entry.meal_type.is_empty() {
                "Entry"
            } else {
                active.entry.meal_type.as_str()
            };
            println!(
                "  → {} {} {:.1} g / {:.2} u left",
                active.entry.timestamp.format("%H:%M"),
                label,
                active.carbs_remaining,
                active.insulin_remaining
            );
        }
    }

    println!();
}
