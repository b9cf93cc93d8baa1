use anyhow::{anyhow, bail, Context, Result};
use certificados::builder::ARCHIVE_NAME;
use certificados::fonts::FontFamily;
use certificados::render::format_color;
use certificados::session::{Session, Status};
use certificados::template::Anchor;
use certificados::CertificateError;
use clap::Parser;
use std::process::ExitCode;
use tracing::Level;

#[derive(Parser)]
#[command(name = "certificados", about = "Genera un certificado PNG por cada nombre de una hoja de cálculo")]
struct Args {
    /// Hoja de cálculo (xlsx, xls, xlsb, ods, csv o tsv)
    sheet: String,

    /// Plantilla (PNG, JPG, GIF, BMP o WebP). Sin ella se usa la incorporada
    #[arg(long)]
    template: Option<String>,

    /// Columna de nombres: índice (desde 0) o texto de la cabecera
    #[arg(long)]
    column: Option<String>,

    /// Posición horizontal del texto, 0-1
    #[arg(long, default_value_t = 0.5)]
    x: f32,

    /// Posición vertical del texto, 0-1
    #[arg(long, default_value_t = 0.5)]
    y: f32,

    /// Tamaño de letra en píxeles (10-240)
    #[arg(long, default_value_t = 64)]
    size: u32,

    #[arg(long, default_value = "#1f2937")]
    color: String,

    #[arg(long, default_value = "Playfair Display")]
    font: String,

    /// Fuente TTF/OTF: FAMILIA=RUTA (familia del catálogo o serif, sans-serif, cursive)
    #[arg(long = "font-file", value_name = "FAMILIA=RUTA")]
    font_files: Vec<String>,

    /// Archivo ZIP de salida
    #[arg(short, long, default_value = ARCHIVE_NAME)]
    output: String,

    /// Guarda además una vista previa del primer certificado
    #[arg(long)]
    preview: Option<String>,

    /// Renderiza en paralelo
    #[arg(long)]
    parallel: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

/// 2 si la hoja, la plantilla o algún ajuste no son válidos; 1 en otro caso.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<CertificateError>() {
        Some(err) if !err.is_generation_failure() => 2,
        _ => 1,
    }
}

fn run(args: &Args) -> Result<()> {
    println!("  Hoja:      {}", args.sheet);
    println!("  Plantilla: {}", args.template.as_deref().unwrap_or("(incorporada)"));
    println!("  Salida:    {}", args.output);
    println!();

    let mut session = Session::new()?;

    println!("[1/4] Leyendo hoja de cálculo...");
    let data = std::fs::read(&args.sheet).with_context(|| format!("No se pudo leer {}", args.sheet))?;
    session.load_sheet(&data, Some(args.sheet.as_str()))?;
    if let Some(query) = &args.column {
        let column = session
            .sheet()
            .and_then(|s| s.find_column(query))
            .ok_or_else(|| CertificateError::input(format!("Columna no encontrada: {}", query)))?;
        session.select_column(column)?;
    }
    let label = session
        .columns()
        .into_iter()
        .find(|c| c.index == session.selected_column())
        .map(|c| c.label)
        .unwrap_or_default();
    print_status(session.upload_status());
    println!("  Columna \"{}\"", label);

    println!("[2/4] Preparando plantilla y estilo...");
    if let Some(path) = &args.template {
        let data = std::fs::read(path).with_context(|| format!("No se pudo leer {}", path))?;
        session.load_template(&data)?;
        print_status(session.template_status());
    } else {
        let geometry = session.geometry();
        println!("  Plantilla incorporada {}×{}", geometry.width, geometry.height);
    }

    for entry in &args.font_files {
        let (family, path) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("--font-file debe tener la forma FAMILIA=RUTA: {}", entry))?;
        let data = std::fs::read(path).with_context(|| format!("No se pudo leer {}", path))?;
        session.register_font(family, data)?;
    }
    session.set_font_family(args.font.parse::<FontFamily>()?);
    session.set_font_size(args.size);
    session.set_font_color(&args.color)?;
    session.set_anchor(Anchor::new(args.x, args.y));
    let (px, py) = session.anchor_pixels();
    let style = session.style();
    println!(
        "  {} {}px {} en ({:.0}, {:.0})",
        style.family.name(),
        style.font_size(),
        format_color(style.color),
        px,
        py
    );
    if !session.has_font(style.family.name()) && !session.has_font(style.family.generic().css_name()) {
        println!("  Sin fuente vectorial para {}: se usa la de mapa de bits", style.family.name());
    }

    if let Some(path) = &args.preview {
        let png = session.render_preview()?;
        std::fs::write(path, png).with_context(|| format!("No se pudo escribir {}", path))?;
        println!("  Vista previa: {}", path);
    }

    println!("[3/4] Generando certificados...");
    let Some(job) = session.start_batch() else {
        bail!("No hay nombres para generar");
    };
    let result = if args.parallel {
        job.run_parallel()
    } else {
        job.run_with_progress(|done, total| println!("  Certificado {}/{} ✓", done, total))
    };
    let archive = match session.finish_batch(result) {
        Ok(archive) => archive,
        Err(err) => {
            if let Some(msg) = session.generation().error() {
                println!("  Generación fallida: {}", msg);
            }
            return Err(err.into());
        }
    };

    println!("[4/4] Escribiendo ZIP...");
    std::fs::write(&args.output, &archive).with_context(|| format!("No se pudo escribir {}", args.output))?;
    println!(
        "  ZIP generado: {} ({:.1} MB, {} certificados)",
        args.output,
        archive.len() as f64 / 1_048_576.0,
        job.len()
    );

    println!("Listo.");
    Ok(())
}

fn print_status(status: &Status) {
    match status {
        Status::Idle => {}
        Status::Ok(msg) => println!("  {}", msg),
        Status::Error(msg) => println!("  ✗ {}", msg),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}
