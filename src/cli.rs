use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "newsdesk", about = "Google News crawl, resolve, extract and score pipeline")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one crawl for a category and exit
    Crawl {
        /// Category name or numeric id
        #[arg(short, long)]
        category: String,
    },
    /// Run the scheduler loop in the foreground (dispatch + cleanup + health)
    Schedule,
    /// Run one pass of automatic failure recovery
    Recover {
        /// Classify and log decisions without disabling categories or sending alerts
        #[arg(long)]
        dry_run: bool,
    },
    /// Manage crawl categories
    Category {
        #[command(subcommand)]
        action: CategoryAction,
    },
    /// Print job/article/category counts
    Status,
}

#[derive(Subcommand)]
pub enum CategoryAction {
    /// Add a new category
    Add {
        #[arg(short, long)]
        name: String,

        /// Comma-separated keywords
        #[arg(short, long, value_delimiter = ',')]
        keywords: Vec<String>,

        /// Comma-separated exclude keywords
        #[arg(short, long, value_delimiter = ',', default_value = "")]
        exclude: Vec<String>,

        #[arg(short, long)]
        language: Option<String>,

        #[arg(long)]
        country: Option<String>,

        #[arg(long)]
        schedule_interval_minutes: Option<u32>,
    },
    /// List all categories
    List,
    /// Disable a category until a given number of hours from now
    Disable {
        /// Category name or numeric id
        #[arg(short, long)]
        category: String,

        #[arg(long, default_value = "24")]
        hours: i64,

        #[arg(short, long, default_value = "manual disable")]
        reason: String,
    },
}
