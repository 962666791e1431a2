use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write as _;
use std::path::PathBuf;

use edugen_common::{Difficulty, GenerationRequest, Grade, QuestionType, WorkMode};
use edugen_core::export::{build_deck, build_document, export_filename, write_json};
use edugen_core::extract::{PlainTextExtractor, TextExtractor};
use edugen_core::segment::split_slides;
use edugen_core::{Config, GenerationSession};
use edugen_protocol::StudioEvent;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "edugen")]
#[command(about = "AI studio for Vietnamese teaching content: exercises, lesson plans, slide decks")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Override text model (e.g., gemini-3-flash-preview)
    #[arg(long)]
    pub model: Option<String>,

    /// Override image model
    #[arg(long)]
    pub image_model: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate content and stream it to the terminal
    Generate {
        /// Topic or lesson name
        topic: String,

        /// What to produce: exercise | lesson-plan | presentation
        #[arg(short, long, default_value = "exercise")]
        mode: WorkMode,

        #[arg(short, long, default_value = "Toán")]
        subject: String,

        #[arg(short, long, default_value = "12")]
        grade: Grade,

        /// Source material (lesson data) inlined on the command line
        #[arg(long, default_value = "")]
        requirements: String,

        /// Extra instructions passed through to the model verbatim
        #[arg(long, default_value = "")]
        instructions: String,

        #[arg(long, default_value = "mixed")]
        question_type: QuestionType,

        #[arg(long, default_value = "mixed")]
        difficulty: Difficulty,

        #[arg(short = 'n', long, default_value = "10")]
        count: u32,

        /// Read source material from a plain-text file
        #[arg(long)]
        source_file: Option<PathBuf>,

        /// Write the final markdown to this path
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Also write an export descriptor (JSON) with a timestamped name
        #[arg(long)]
        export: bool,

        /// Open the interactive studio view instead of plain streaming
        #[arg(long)]
        tui: bool,
    },
    /// Preview saved markdown slides
    Preview {
        /// Path to markdown file
        file: PathBuf,
    },
    /// Re-export saved markdown as a document/deck descriptor
    Export {
        file: PathBuf,

        #[arg(short, long, default_value = "exercise")]
        mode: WorkMode,

        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::from_env();
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(model) = cli.image_model {
        config.image_model = model;
    }

    match cli.command {
        Some(Commands::Generate {
            topic,
            mode,
            subject,
            grade,
            requirements,
            instructions,
            question_type,
            difficulty,
            count,
            source_file,
            out,
            export,
            tui,
        }) => {
            let request = build_request(
                mode,
                subject,
                grade,
                topic,
                requirements,
                instructions,
                question_type,
                difficulty,
                count,
                source_file,
            )
            .await;
            if tui {
                edugen_tui::run_studio(config, request).await
            } else {
                generate(config, request, out, export).await
            }
        }
        Some(Commands::Preview { file }) => edugen_tui::run_preview(&file).await,
        Some(Commands::Export { file, mode, out }) => export_saved(&file, mode, out).await,
        None => {
            use clap::CommandFactory;
            <Cli as CommandFactory>::command().print_help()?;
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn build_request(
    mode: WorkMode,
    subject: String,
    grade: Grade,
    topic: String,
    mut requirements: String,
    instructions: String,
    question_type: QuestionType,
    difficulty: Difficulty,
    question_count: u32,
    source_file: Option<PathBuf>,
) -> GenerationRequest {
    if let Some(path) = source_file {
        // Extraction problems are user-visible, not fatal.
        match PlainTextExtractor.extract(&path).await {
            Ok(text) => {
                if requirements.trim().is_empty() {
                    requirements = text;
                } else {
                    requirements.push('\n');
                    requirements.push_str(&text);
                }
            }
            Err(e) => eprintln!("{}", e),
        }
    }
    GenerationRequest {
        mode,
        subject,
        grade,
        topic,
        requirements,
        instructions,
        question_type,
        difficulty,
        question_count,
    }
}

async fn generate(
    config: Config,
    request: GenerationRequest,
    out: Option<PathBuf>,
    export: bool,
) -> Result<()> {
    let mode = request.mode;
    let (mut session, events) = GenerationSession::new(config);

    // Print buffer suffixes as snapshots arrive; monotonic growth
    // makes suffix printing safe.
    let stream_printer = async {
        let mut printed = 0usize;
        loop {
            let Ok(ev) = events.recv().await else {
                break false;
            };
            match ev {
                StudioEvent::BufferUpdate { content } => print_suffix(&content, &mut printed),
                StudioEvent::GenerationComplete { content } => {
                    print_suffix(&content, &mut printed);
                    println!();
                    break true;
                }
                StudioEvent::GenerationFailed { message } => {
                    eprintln!("\n{}", message);
                    break false;
                }
                _ => {}
            }
        }
    };

    let (gen_result, completed) = tokio::join!(session.generate(request), stream_printer);
    gen_result?;

    // The queue was activated before generate() returned, so the flag
    // tells us whether an enrichment phase is running.
    if session.queue_state().lock().await.is_active() {
        while let Ok(ev) = events.recv().await {
            match ev {
                StudioEvent::ImageQueueStarted { pending } => {
                    eprintln!("Đang tạo {} hình minh họa...", pending);
                }
                StudioEvent::ImageStarted { slide } => {
                    eprintln!("Tạo hình cho slide {}...", slide + 1);
                }
                StudioEvent::ImageReady { slide } => {
                    eprintln!("Đã có hình cho slide {}.", slide + 1);
                }
                StudioEvent::ImageQuotaWait { slide, .. } => {
                    eprintln!("Hết hạn ngạch, sẽ thử lại slide {}.", slide + 1);
                }
                StudioEvent::CooldownTick { remaining_secs, .. } => {
                    eprint!("\rChờ hạn ngạch: {}s ", remaining_secs);
                    let _ = std::io::stderr().flush();
                }
                StudioEvent::ImageFailed { slide, message, .. } => {
                    eprintln!("\nSlide {}: {}", slide + 1, message);
                }
                StudioEvent::ImageQueueIdle => {
                    eprintln!();
                    break;
                }
                _ => {}
            }
        }
    }

    let content = session.published().to_string();
    if let Some(path) = &out {
        tokio::fs::write(path, &content).await?;
        println!("Đã lưu nội dung: {}", path.display());
    }

    if export && completed {
        match mode {
            WorkMode::Presentation => {
                if let Some(deck) = session.deck() {
                    let images = session.images().await;
                    let descriptor = build_deck(deck, &images);
                    let path = PathBuf::from(export_filename("EduGen_Slide", "json"));
                    write_json(&path, &descriptor).await?;
                    println!("Đã xuất slide: {}", path.display());
                }
            }
            m => {
                let descriptor = build_document(m, &content);
                let prefix = if m == WorkMode::LessonPlan {
                    "EduGen_GiaoAn"
                } else {
                    "EduGen_BaiTap"
                };
                let path = PathBuf::from(export_filename(prefix, "json"));
                write_json(&path, &descriptor).await?;
                println!("Đã xuất tài liệu: {}", path.display());
            }
        }
    }
    Ok(())
}

async fn export_saved(file: &PathBuf, mode: WorkMode, out: Option<PathBuf>) -> Result<()> {
    let content = tokio::fs::read_to_string(file).await?;
    let prefix = match mode {
        WorkMode::Presentation => "EduGen_Slide",
        WorkMode::LessonPlan => "EduGen_GiaoAn",
        WorkMode::Exercise => "EduGen_BaiTap",
    };
    let path = out.unwrap_or_else(|| PathBuf::from(export_filename(prefix, "json")));
    if mode.is_presentation() {
        let deck = split_slides(&content);
        let descriptor = build_deck(&deck, &std::collections::HashMap::new());
        write_json(&path, &descriptor).await?;
    } else {
        let descriptor = build_document(mode, &content);
        write_json(&path, &descriptor).await?;
    }
    println!("Đã xuất: {}", path.display());
    Ok(())
}

fn print_suffix(content: &str, printed: &mut usize) {
    if content.len() > *printed {
        print!("{}", &content[*printed..]);
        let _ = std::io::stdout().flush();
        *printed = content.len();
    }
}
