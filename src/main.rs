mod cli;

use stockroom::config;
use stockroom::images::ImageUpload;
use stockroom::transfer::ExportFormat;
use stockroom::Inventory;
use stockroom_db::models::{Image, Product};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, ImageCommands};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "stockroom=trace,stockroom_db=debug,stockroom_common=debug".to_string()
        } else {
            "stockroom=info,stockroom_db=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("stockroom {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = config::load_config_or_default(cli.config.as_deref())?;
    let mut inventory = Inventory::open(&config).context("Failed to open inventory store")?;

    match cli.command {
        Commands::Init => init(&inventory),
        Commands::Add { product, json } => {
            let product = inventory.products().add_product(&product.into_input())?;
            print_product(&product, json)
        }
        Commands::Update { id, product, json } => {
            let product = inventory
                .products()
                .update_product(id, &product.into_input())?;
            print_product(&product, json)
        }
        Commands::Delete { id } => {
            if inventory.products().delete_product(id)? {
                println!("Deleted product {}", id);
            } else {
                println!("Product {} does not exist", id);
            }
            Ok(())
        }
        Commands::Show { id, json } => {
            let product = inventory
                .products()
                .get_by_id(id)?
                .ok_or_else(|| anyhow::anyhow!("Product not found: {}", id))?;
            print_product(&product, json)
        }
        Commands::List { json } => print_products(&inventory.products().get_all()?, json),
        Commands::Search { term, json } => {
            print_products(&inventory.products().search(&term)?, json)
        }
        Commands::Stats { json } => {
            let stats = inventory.products().get_stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Products: {}", stats.total_products);
                println!("Companies: {}", stats.total_companies);
                println!("Average retail price: {}", stats.average_retail_price);
                println!("Images: {}", stats.total_images);
            }
            Ok(())
        }
        Commands::Image { command } => image_command(&inventory, command),
        Commands::Export { format, out } => export(&inventory, format.into(), &out),
        Commands::Import { file } => import(&mut inventory, &file),
        Commands::Version => Ok(()),
    }
}

fn init(inventory: &Inventory) -> Result<()> {
    let report = inventory.schema_report();
    println!("Store ready ({})", inventory.store().mode());
    println!("  Migrations applied: {}", report.migrations_applied);
    if let Some(ref legacy) = report.legacy {
        println!("  Legacy columns migrated: {}", legacy.legacy_columns.join(", "));
        match legacy.rows_copied {
            Some(rows) => println!("  Rows copied: {}", rows),
            None => println!("  Rows copied: none (legacy data could not be mapped)"),
        }
    }
    if !report.dropped_tables.is_empty() {
        println!("  Dropped tables: {}", report.dropped_tables.join(", "));
    }
    if report.repaired_references > 0 {
        println!("  Repaired image references: {}", report.repaired_references);
    }
    Ok(())
}

fn print_product(product: &Product, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(product)?);
        return Ok(());
    }

    println!(
        "#{} {} | {} | {} | qty {} | purchase {:.2} | wholesale {:.2} | retail {:.2}",
        product.id,
        product.product_name,
        product.company_name,
        product.product_quality,
        product.quantity_bundle,
        product.purchase_price,
        product.wholesale_price,
        product.retail_price
    );
    if let Some(ref image_id) = product.image_id {
        println!("    image: {}", image_id);
    }
    for field in &product.dynamic_fields {
        println!("    {}: {} ({})", field.field_name, field.field_value, field.field_type);
    }
    Ok(())
}

fn print_products(products: &[Product], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(products)?);
        return Ok(());
    }

    if products.is_empty() {
        println!("No products");
    }
    for product in products {
        print_product(product, false)?;
    }
    Ok(())
}

fn print_image(image: &Image, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(image)?);
    } else {
        println!("Image: {}", image.image_id);
        println!("  Product: {}", image.product_id);
        println!("  File: {}", image.file_path);
        println!("  Original: {} ({} bytes, {})", image.original_name, image.file_size, image.mime_type);
        println!("  Payload length: {}", image.base64_data.len());
    }
    Ok(())
}

fn guess_mime(path: &Path) -> String {
    path.extension()
        .and_then(image::ImageFormat::from_extension)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

fn image_command(inventory: &Inventory, command: ImageCommands) -> Result<()> {
    match command {
        ImageCommands::Set {
            product_id,
            file,
            mime,
        } => {
            let data = std::fs::read(&file)
                .with_context(|| format!("Failed to read image file: {:?}", file))?;
            let original_name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let upload = ImageUpload::new(original_name, mime.unwrap_or_else(|| guess_mime(&file)));

            let image = inventory.images().save_image(&data, &upload, product_id)?;
            print_image(&image, false)
        }
        ImageCommands::Show { product_id, json } => {
            let image = inventory
                .images()
                .get_by_product_id(product_id)?
                .ok_or_else(|| anyhow::anyhow!("Product {} has no image", product_id))?;
            print_image(&image, json)
        }
        ImageCommands::Remove { product_id } => {
            if inventory.images().delete_image(product_id)? {
                println!("Removed image of product {}", product_id);
            } else {
                println!("Product {} has no image", product_id);
            }
            Ok(())
        }
    }
}

fn export(inventory: &Inventory, format: ExportFormat, out: &Path) -> Result<()> {
    let artifact = inventory.export(format)?;

    std::fs::create_dir_all(out)
        .with_context(|| format!("Failed to create output directory: {:?}", out))?;
    let path = out.join(&artifact.file_name);
    std::fs::write(&path, &artifact.bytes)
        .with_context(|| format!("Failed to write export: {:?}", path))?;

    println!("{}", path.display());
    Ok(())
}

fn import(inventory: &mut Inventory, file: &Path) -> Result<()> {
    let data =
        std::fs::read(file).with_context(|| format!("Failed to read import file: {:?}", file))?;
    let summary = inventory.import(&data)?;

    println!(
        "Imported {} products from {} file",
        summary.products, summary.format
    );
    if let Some(report) = summary.schema.filter(|r| r.changed()) {
        println!("  Migrations applied: {}", report.migrations_applied);
    }
    Ok(())
}
