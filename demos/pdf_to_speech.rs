use std::path::{Path, PathBuf};
use std::time::Instant;

use pdf_voice::{
    engines::coqui::CoquiLoader, page_count, EngineMode, Language, Pipeline, PipelineConfig,
};

fn usage() -> ! {
    eprintln!("Usage: pdf_to_speech <file.pdf> [language] [voice_sample.wav]");
    eprintln!("Languages:");
    for language in Language::ALL {
        eprintln!("  {:<10} ({})", language.name(), language.code());
    }
    std::process::exit(2);
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let pdf = match args.next() {
        Some(path) => PathBuf::from(path),
        None => usage(),
    };
    let language = args.next().unwrap_or_else(|| Language::default().name().to_string());
    let voice_sample = args.next().map(PathBuf::from);

    let mode = if voice_sample.is_some() {
        EngineMode::Clone
    } else {
        EngineMode::Plain
    };

    let stem = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let output_dir = Path::new("outputs");
    std::fs::create_dir_all(output_dir)?;
    let output = output_dir.join(format!("{stem}_{language}.{}", mode.audio_extension()));

    println!("Reading {} ({} pages)", pdf.display(), page_count(&pdf));

    let config = PipelineConfig {
        language,
        mode,
        ..Default::default()
    };
    let loader = CoquiLoader::new().accept_license(true);
    let mut pipeline = Pipeline::new(config, Box::new(loader));

    let start = Instant::now();
    let audio = pipeline.convert(&pdf, mode, voice_sample.as_deref(), Some(&output))?;
    println!(
        "Saved {} ({} bytes) in {:.2?}",
        audio.path.display(),
        audio.bytes,
        start.elapsed()
    );
    Ok(())
}
