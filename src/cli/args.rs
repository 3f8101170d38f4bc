use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "dashtable",
    version,
    about = "terminal client for paginated, searchable dashboard tables",
    long_about = "dashtable pages through the tables of a business dashboard API (products, stock history, users and raw database tables), edits records and shows the headline KPIs.\n\nExamples:\n  dashtable products --search widget --page 2\n  dashtable db-table Orders --per-page 50\n  dashtable browse users\n  dashtable watch products --interval 60\n\nTip: Use `dashtable config init` to write ~/.dashtable/config.yml and keep invocations short."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true,
        help_heading = "Output",
        help = "Increase log verbosity (-v, -vv, -vvv)."
    )]
    pub verbose: u8,

    #[arg(
        short = 'c',
        long = "color",
        global = true,
        help_heading = "Output",
        help = "Enable colored output (overrides --no-color)."
    )]
    pub color: bool,

    #[arg(
        short = 'n',
        long = "no-color",
        global = true,
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'o',
        long = "output-format",
        value_name = "FORMAT",
        global = true,
        help_heading = "Output",
        help = "Output format: text or json."
    )]
    pub output_format: Option<String>,

    #[arg(
        short = 'C',
        long = "config",
        value_name = "FILE",
        global = true,
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.dashtable/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        short = 'b',
        long = "base-url",
        value_name = "URL",
        global = true,
        help_heading = "HTTP",
        help = "API base URL (default http://127.0.0.1:5000/api)."
    )]
    pub base_url: Option<String>,

    #[arg(
        short = 't',
        long = "timeout",
        value_name = "SECONDS",
        global = true,
        help_heading = "HTTP",
        help = "Request timeout in seconds (no timeout by default)."
    )]
    pub timeout: Option<u64>,

    #[arg(
        short = 'p',
        long = "proxy",
        value_name = "URL",
        global = true,
        help_heading = "HTTP",
        help = "HTTP(S) proxy for all requests."
    )]
    pub proxy: Option<String>,

    #[arg(
        short = 'H',
        long = "header",
        value_name = "HEADER",
        global = true,
        help_heading = "HTTP",
        help = "Extra request header, formatted 'Key: Value'."
    )]
    pub header: Option<String>,

    #[arg(
        long = "page-sizes-file",
        value_name = "FILE",
        global = true,
        help_heading = "Input",
        help = "Where per-table page sizes are remembered."
    )]
    pub page_sizes_file: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct PageArgs {
    #[arg(short = 'P', long = "page", value_name = "N", help = "Page to show (1-based).")]
    pub page: Option<u32>,

    #[arg(
        short = 's',
        long = "search",
        value_name = "TERM",
        help = "Only show rows matching TERM."
    )]
    pub search: Option<String>,

    #[arg(
        short = 'N',
        long = "per-page",
        value_name = "N",
        help = "Rows per page; remembered for this table type."
    )]
    pub per_page: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EditableTable {
    Products,
    Users,
}

#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct ProductArgs {
    #[arg(long = "id", value_name = "ITEM_CODE", help = "Existing item code to update; omit to create.")]
    pub id: Option<String>,

    #[arg(long = "item-code", value_name = "ITEM_CODE", help = "Item code for a new product.")]
    pub item_code: Option<String>,

    #[arg(long = "name", value_name = "NAME")]
    pub name: String,

    #[arg(long = "category", value_name = "CATEGORY", default_value = "")]
    pub category: String,

    #[arg(long = "price", value_name = "PRICE")]
    pub price: f64,

    #[arg(long = "stock", value_name = "QTY", default_value_t = 0)]
    pub stock: i64,

    #[arg(long = "status", value_name = "STATUS", default_value = "Active")]
    pub status: String,

    #[arg(long = "description", value_name = "TEXT", default_value = "")]
    pub description: String,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct UserArgs {
    #[arg(long = "id", value_name = "USER_ID", help = "Existing user id to update; omit to create.")]
    pub id: Option<String>,

    #[arg(long = "username", value_name = "NAME")]
    pub username: String,

    #[arg(long = "full-name", value_name = "NAME", default_value = "")]
    pub full_name: String,

    #[arg(long = "email", value_name = "EMAIL", default_value = "")]
    pub email: String,

    #[arg(long = "role", value_name = "ROLE", default_value = "User")]
    pub role: String,

    #[arg(long = "status", value_name = "STATUS", default_value = "Active")]
    pub status: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List products.
    Products(PageArgs),

    /// List stock movements.
    StockHistory(PageArgs),

    /// List users.
    Users(PageArgs),

    /// List a logical dashboard table (see `tables`).
    Table {
        name: String,
        #[command(flatten)]
        page: PageArgs,
    },

    /// List a raw database table (see `db-tables`).
    DbTable {
        name: String,
        #[command(flatten)]
        page: PageArgs,
    },

    /// Show the logical dashboard tables.
    Tables,

    /// Show the raw database tables.
    DbTables,

    /// Delete a product or user, then show the refreshed page.
    Delete {
        #[arg(value_enum)]
        table: EditableTable,
        id: String,
        #[arg(short = 'y', long = "yes", help = "Skip the confirmation prompt.")]
        yes: bool,
        #[command(flatten)]
        page: PageArgs,
    },

    /// Create or update a product.
    SaveProduct(ProductArgs),

    /// Create or update a user.
    SaveUser(UserArgs),

    /// Show the headline KPIs.
    Kpi,

    /// Make a database table the source of every dashboard view.
    SetSource {
        table: String,
        #[arg(short = 'y', long = "yes", help = "Skip the confirmation prompt.")]
        yes: bool,
    },

    /// Re-fetch KPIs and a table on a fixed interval.
    Watch {
        #[arg(
            default_value = "products",
            help = "products, stock-history, users, table:NAME or db:NAME."
        )]
        target: String,
        #[arg(long = "interval", value_name = "SECONDS", help = "Refresh interval (default 300).")]
        interval: Option<u64>,
        #[command(flatten)]
        page: PageArgs,
    },

    /// Page through a table interactively from stdin.
    Browse {
        #[arg(
            default_value = "products",
            help = "products, stock-history, users, table:NAME or db:NAME."
        )]
        target: String,
        #[command(flatten)]
        page: PageArgs,
    },

    /// Manage the config file.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Write a default config file if none exists.
    Init,
    /// Print the config file location.
    Path,
}
