use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use stockroom::transfer::ExportFormat;
use stockroom_common::ProductId;
use stockroom_db::models::{DynamicFieldInput, ProductInput};

#[derive(Parser)]
#[command(name = "stockroom")]
#[command(author, version, about = "Inventory catalog with SQLite-backed persistence")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create or migrate the store and report what changed
    Init,

    /// Add a product
    Add {
        #[command(flatten)]
        product: ProductArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace a product's fields
    Update {
        id: ProductId,

        #[command(flatten)]
        product: ProductArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a product with its image and fields
    Delete { id: ProductId },

    /// Show one product
    Show {
        id: ProductId,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List all products, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search name, company and quality
    Search {
        term: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show catalog statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage product images
    Image {
        #[command(subcommand)]
        command: ImageCommands,
    },

    /// Export the catalog to a file
    Export {
        /// Artifact format
        #[arg(long, value_enum, default_value_t = FormatArg::Snapshot)]
        format: FormatArg,

        /// Directory to write the artifact to
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Replace the catalog with an exported file
    Import {
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Display version information
    Version,
}

#[derive(Subcommand)]
pub enum ImageCommands {
    /// Store an image file as the product's image
    Set {
        product_id: ProductId,

        #[arg(required = true)]
        file: PathBuf,

        /// Declared media type (guessed from the extension by default)
        #[arg(long)]
        mime: Option<String>,
    },

    /// Show the product's image record
    Show {
        product_id: ProductId,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove the product's image
    Remove { product_id: ProductId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Snapshot,
    Document,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Snapshot => ExportFormat::Snapshot,
            FormatArg::Document => ExportFormat::Document,
        }
    }
}

#[derive(Args)]
pub struct ProductArgs {
    /// Product name
    #[arg(long)]
    pub name: String,

    /// Company or brand
    #[arg(long)]
    pub company: String,

    /// Quality grade
    #[arg(long)]
    pub quality: String,

    /// Units per bundle
    #[arg(long, default_value_t = 1)]
    pub quantity: i64,

    #[arg(long)]
    pub purchase: f64,

    #[arg(long)]
    pub wholesale: f64,

    #[arg(long)]
    pub retail: f64,

    /// Dynamic field as name=value or name=value:type (repeatable)
    #[arg(long = "field", value_parser = parse_field)]
    pub fields: Vec<DynamicFieldInput>,
}

impl ProductArgs {
    pub fn into_input(self) -> ProductInput {
        ProductInput {
            product_name: self.name,
            company_name: self.company,
            product_quality: self.quality,
            quantity_bundle: self.quantity,
            purchase_price: self.purchase,
            wholesale_price: self.wholesale,
            retail_price: self.retail,
            image_id: None,
            dynamic_fields: self.fields,
        }
    }
}

/// Parse `name=value[:type]`.
///
/// A trailing `:type` is only taken as the type when it starts with a letter
/// and holds nothing but letters, digits, `_` or `-`, so values like
/// `http://host` or `10:30` stay intact.
pub fn parse_field(s: &str) -> Result<DynamicFieldInput, String> {
    let (name, rest) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got {:?}", s))?;
    if name.trim().is_empty() {
        return Err(format!("field name is empty in {:?}", s));
    }

    let typed = rest.rsplit_once(':').filter(|(_, tag)| {
        tag.starts_with(|c: char| c.is_ascii_alphabetic())
            && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    });

    Ok(match typed {
        Some((value, tag)) => DynamicFieldInput::text(name, value).with_type(tag),
        None => DynamicFieldInput::text(name, rest),
    })
}
