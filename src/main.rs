use anyhow::Result;
use clap::Parser;
use smart_receipt::ai::{CompletionProvider, GeminiProvider, ModelFallback};
use smart_receipt::config::AppConfig;
use smart_receipt::errors::{error_logging, AppError};
use smart_receipt::heuristics::HeuristicExtractor;
use smart_receipt::instance_manager::OcrInstanceManager;
use smart_receipt::ocr::{NoTextReason, TesseractRecognizer, TextRecognizer};
use smart_receipt::validation::{validate_amount_input, validate_location, validate_merchant};
use smart_receipt::{
    observability, Category, ExpenseCorrection, ExtractionEngine, ExtractionStrategy, FieldGuess,
    Ledger, RawReceiptImage, ReceiptPipeline, ReceiptSession,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tracing::{info, warn};

/// Extract expenses from receipt photos and export them as CSV
#[derive(Parser)]
#[command(name = "smart-receipt")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Guess fields with the generative model (needs GEMINI_API_KEY)
    #[arg(long, conflicts_with = "heuristic")]
    ai: bool,

    /// Guess fields with keyword heuristics only
    #[arg(long)]
    heuristic: bool,

    /// Where to write the CSV export
    #[arg(short, long, default_value = "gastos.csv")]
    output: PathBuf,

    /// Confirm every guess without prompting
    #[arg(short, long)]
    yes: bool,

    /// Receipt photos to process
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

#[derive(Debug, PartialEq)]
enum Review {
    Confirm(Option<ExpenseCorrection>),
    Discard,
    /// Input closed before an answer; nothing is saved and the run stops
    InputClosed,
}

/// Load and validate configuration, applying command-line overrides
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    if cli.heuristic {
        config.strategy = ExtractionStrategy::Heuristic;
    } else if cli.ai && !config.strategy.requires_model() {
        config.strategy = ExtractionStrategy::Ai;
    }

    config.validate().map_err(|e| {
        anyhow::anyhow!("Configuration validation failed: {}. Please check your environment or .env file.", e)
    })?;
    Ok(config)
}

fn build_engine(config: &AppConfig) -> Result<ExtractionEngine> {
    if !config.strategy.requires_model() {
        return Ok(ExtractionEngine::heuristic_only(HeuristicExtractor::default()));
    }

    let api_key = config
        .ai
        .api_key
        .clone()
        .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY environment variable is required for model extraction"))?;
    let provider =
        GeminiProvider::new(api_key, config.ai.base_url.clone()).map_err(AppError::from)?;
    let fallback = ModelFallback::new(provider, config.ai.models.clone(), config.ai.call_timeout())?
        .with_location(config.ai.request_location);

    info!(models = ?fallback.models(), "Model fallback list configured");
    Ok(ExtractionEngine::new(
        config.strategy,
        HeuristicExtractor::default(),
        Some(fallback),
    )?)
}

fn media_type_for(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let media_type = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(media_type.to_string())
}

fn print_guess(guess: &FieldGuess) {
    println!("  Comercio:  {}", guess.merchant);
    println!("  Monto:     ${:.2}", guess.amount);
    println!("  Categoria: {}", guess.category);
    println!("  Ubicacion: {}", guess.location);
}

fn describe_no_text(reason: &NoTextReason) -> String {
    match reason {
        NoTextReason::Undecodable(detail) => format!("the file is not a readable image ({})", detail),
        NoTextReason::NothingRecognized => "no text was recognized".to_string(),
        NoTextReason::RecognitionFailed(detail) => format!("recognition failed ({})", detail),
        NoTextReason::TimedOut => "recognition timed out".to_string(),
    }
}

/// Returns `None` once input is closed
async fn prompt<R>(input: &mut Lines<R>, question: &str) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut stdout = tokio::io::stdout();
    stdout.write_all(question.as_bytes()).await?;
    stdout.flush().await?;
    Ok(input.next_line().await?.map(|line| line.trim().to_string()))
}

/// Ask for each field; an empty answer keeps the guessed value.
/// Returns `None` if input closes before every field was asked.
async fn ask_corrections<R>(input: &mut Lines<R>) -> Result<Option<ExpenseCorrection>>
where
    R: AsyncBufRead + Unpin,
{
    let mut correction = ExpenseCorrection::default();

    loop {
        let Some(answer) = prompt(input, "  Comercio (enter = keep): ").await? else {
            return Ok(None);
        };
        if answer.is_empty() {
            break;
        }
        match validate_merchant(&answer) {
            Ok(merchant) => {
                correction.merchant = Some(merchant.to_string());
                break;
            }
            Err(code) => {
                error_logging::log_validation_error(&code, "edit_merchant", "merchant", Some(&answer));
                println!("  Invalid merchant ({})", code);
            }
        }
    }

    loop {
        let Some(answer) = prompt(input, "  Monto (enter = keep): ").await? else {
            return Ok(None);
        };
        if answer.is_empty() {
            break;
        }
        match validate_amount_input(&answer) {
            Ok(amount) => {
                correction.amount = Some(amount);
                break;
            }
            Err(code) => {
                error_logging::log_validation_error(&code, "edit_amount", "amount", Some(&answer));
                println!("  Invalid amount ({})", code);
            }
        }
    }

    let labels: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
    let Some(answer) =
        prompt(input, &format!("  Categoria [{}] (enter = keep): ", labels.join("/"))).await?
    else {
        return Ok(None);
    };
    if !answer.is_empty() {
        correction.category = Some(Category::from_label(&answer).unwrap_or_default());
    }

    let Some(answer) = prompt(input, "  Ubicacion (enter = keep): ").await? else {
        return Ok(None);
    };
    match validate_location(&answer) {
        Ok(location) => correction.location = location.map(str::to_string),
        Err(code) => println!("  Location ignored ({})", code),
    }

    Ok(Some(correction))
}

async fn review<R>(input: &mut Lines<R>) -> Result<Review>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let Some(answer) = prompt(input, "[c]onfirmar / [e]ditar / [d]escartar: ").await? else {
            return Ok(Review::InputClosed);
        };
        match answer.to_lowercase().as_str() {
            "c" | "" => return Ok(Review::Confirm(None)),
            "e" => {
                return Ok(match ask_corrections(input).await? {
                    Some(correction) => Review::Confirm(Some(correction)),
                    None => Review::InputClosed,
                })
            }
            "d" => return Ok(Review::Discard),
            _ => println!("Please answer c, e or d"),
        }
    }
}

/// Process every image in order. Without `input` every guess is confirmed as is.
///
/// Stops at the first pipeline error; receipts confirmed before it stay in
/// the session's ledger.
async fn process_receipts<P, R>(
    pipeline: &ReceiptPipeline<P>,
    session: &mut ReceiptSession,
    images: &[PathBuf],
    mut input: Option<&mut Lines<R>>,
) -> Result<()>
where
    P: CompletionProvider,
    R: AsyncBufRead + Unpin,
{
    for path in images {
        println!("\n== {} ==", path.display());

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error_logging::log_filesystem_error(&e, "read_receipt", path.to_str());
                println!("Could not read file: {}", e);
                continue;
            }
        };

        let image = RawReceiptImage::new(bytes, media_type_for(path));
        let processed = pipeline.process(session, image).await?;

        if let Some(reason) = &processed.no_text {
            println!("No text found: {}. Fields are placeholders.", describe_no_text(reason));
        }
        print_guess(&processed.guess.guess);

        let decision = match input.as_deref_mut() {
            Some(lines) => review(lines).await?,
            None => Review::Confirm(None),
        };

        match decision {
            Review::Confirm(correction) => match session.confirm(correction) {
                Ok(expense) => println!("Saved: {} ${:.2}", expense.merchant(), expense.amount()),
                Err(e) => {
                    warn!(error = %e, "Could not confirm receipt");
                    println!("Not saved: {}", e);
                    session.discard()?;
                }
            },
            Review::Discard => {
                session.discard()?;
                println!("Discarded");
            }
            Review::InputClosed => {
                session.discard()?;
                warn!("Input closed during review, remaining receipts skipped");
                println!("Input closed; receipt not saved");
                break;
            }
        }
    }

    Ok(())
}

fn export_ledger(ledger: &Ledger, output: &Path) -> Result<()> {
    println!(
        "\n{} expense(s), total ${:.2}",
        ledger.len(),
        ledger.total()
    );

    if !ledger.is_empty() {
        ledger.write_csv(output)?;
        println!("Exported to {}", output.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_configuration(&cli)?;

    observability::init_observability(&config.observability)?;
    info!("{}", config.summary());

    // One Tesseract engine for the whole run, created on first use
    let manager = Arc::new(OcrInstanceManager::new(config.ocr.clone()));
    let recognizer: Arc<dyn TextRecognizer> = Arc::new(TesseractRecognizer::new(manager));
    let pipeline = ReceiptPipeline::new(config.ocr.clone(), recognizer, build_engine(&config)?);

    let mut session = ReceiptSession::new();
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let input = if cli.yes { None } else { Some(&mut input) };

    let outcome = process_receipts(&pipeline, &mut session, &cli.images, input).await;
    if let Err(e) = &outcome {
        warn!(error = %e, "Processing stopped early, exporting confirmed expenses");
    }

    export_ledger(session.ledger(), &cli.output)?;
    outcome
}
