use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::model::task::Priority;

#[derive(Parser)]
#[command(
    name = "tn",
    about = concat!(
        "tasknest v",
        env!("CARGO_PKG_VERSION"),
        " - nested to-do lists from plain sentences"
    ),
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Backend root URL (overrides config and TASKNEST_API_URL)
    #[arg(long = "api-url", global = true)]
    pub api_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a sentence into description, priority, due date and recurrence
    Parse(ParseArgs),
    /// Show example sentences the parser understands
    Examples(ExamplesArgs),
    /// Suggest subtasks for a task without contacting the server
    Suggest(SuggestArgs),
    /// Read or change client settings
    Config(ConfigCmd),
    /// Read or change display preferences kept next to the token
    Prefs(PrefsCmd),
    /// Sign in with username (or e-mail) and password
    Login(LoginArgs),
    /// Create an account
    Register(RegisterArgs),
    /// Forget the stored token
    Logout,
    /// Exchange an identity-provider token or code for a session
    Auth(AuthCmd),
    /// List projects
    Projects,
    /// Show a project's task tree
    Show(ListArg),
    /// Create a project whose tasks are generated from a keyword
    Generate(GenerateArgs),
    /// Rename a project
    Rename(RenameArgs),
    /// Delete a project and all of its tasks
    DeleteProject(ListArg),
    /// Add a task from a sentence
    Add(AddArgs),
    /// Mark a task done (or not done with --undo)
    Toggle(ToggleArgs),
    /// Change a task's description
    Edit(EditArgs),
    /// Set a task's priority
    Priority(PriorityArgs),
    /// Set or clear a task's due date
    Due(DueArgs),
    /// Delete a task and its subtasks
    Rm(ItemArgs),
    /// Move a task among its siblings
    Mv(MvArgs),
    /// Break a task into subtasks
    Subtasks(SubtasksArgs),
}

// ---------------------------------------------------------------------------
// Offline commands
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ParseArgs {
    /// Sentence to parse (words are joined with spaces)
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,
    /// Reference time instead of now, e.g. 2025-03-05T14:10
    #[arg(long)]
    pub now: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Lang {
    Ko,
    En,
}

impl Lang {
    pub fn code(self) -> &'static str {
        match self {
            Lang::Ko => "ko",
            Lang::En => "en",
        }
    }
}

#[derive(Args)]
pub struct ExamplesArgs {
    #[arg(long, value_enum, default_value = "ko")]
    pub lang: Lang,
}

#[derive(Args)]
pub struct SuggestArgs {
    /// Task to break down
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,
}

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print a setting (e.g. api.base_url)
    Get(ConfigKeyArg),
    /// Change a setting
    Set(ConfigSetArgs),
    /// Print the config file location
    Path,
}

#[derive(Args)]
pub struct ConfigKeyArg {
    pub key: String,
}

#[derive(Args)]
pub struct ConfigSetArgs {
    pub key: String,
    pub value: String,
}

#[derive(Args)]
pub struct PrefsCmd {
    #[command(subcommand)]
    pub action: PrefsAction,
}

#[derive(Subcommand)]
pub enum PrefsAction {
    /// Print all preferences as JSON
    Show,
    /// Set one preference; the value is read as JSON, else as a string
    Set(ConfigSetArgs),
    /// Remove one preference
    Unset(ConfigKeyArg),
    /// Remove every preference
    Clear,
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct LoginArgs {
    /// Username, or an e-mail address whose local part is the username
    pub user: String,
    #[arg(long, env = "TASKNEST_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Args)]
pub struct RegisterArgs {
    pub email: String,
    #[arg(long, env = "TASKNEST_PASSWORD", hide_env_values = true)]
    pub password: String,
    /// Defaults to the local part of the e-mail address
    #[arg(long)]
    pub username: Option<String>,
}

#[derive(Args)]
pub struct AuthCmd {
    #[command(subcommand)]
    pub action: AuthAction,
}

#[derive(Subcommand)]
pub enum AuthAction {
    /// Sign in with an ID token from Google or GitHub
    Social(SocialArgs),
    /// Finish a Naver sign-in with its authorization code
    Naver(NaverArgs),
    /// Finish a Kakao sign-in with its authorization code
    Kakao(KakaoArgs),
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ProviderArg {
    Google,
    Github,
}

#[derive(Args)]
pub struct SocialArgs {
    #[arg(value_enum)]
    pub provider: ProviderArg,
    pub id_token: String,
    pub email: String,
    #[arg(long)]
    pub display_name: Option<String>,
    #[arg(long)]
    pub photo_url: Option<String>,
}

#[derive(Args)]
pub struct NaverArgs {
    pub code: String,
    pub state: String,
    pub redirect_uri: String,
}

#[derive(Args)]
pub struct KakaoArgs {
    pub code: String,
    pub redirect_uri: String,
}

// ---------------------------------------------------------------------------
// Projects and tasks
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListArg {
    /// Project id, or its 1-based position in `tn projects`
    pub list: String,
}

#[derive(Args)]
pub struct GenerateArgs {
    #[arg(required = true, num_args = 1..)]
    pub keyword: Vec<String>,
}

#[derive(Args)]
pub struct RenameArgs {
    pub list: String,
    #[arg(required = true, num_args = 1..)]
    pub keyword: Vec<String>,
}

#[derive(Args)]
pub struct AddArgs {
    pub list: String,
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,
    /// Parse locally and create the task as is, instead of server-side parsing
    #[arg(long)]
    pub quick: bool,
    /// Add as a subtask of this task (implies --quick)
    #[arg(long)]
    pub parent: Option<String>,
}

#[derive(Args)]
pub struct ItemArgs {
    pub list: String,
    /// Task id, or its position path as shown by `tn show` (e.g. 2.1)
    pub item: String,
}

#[derive(Args)]
pub struct ToggleArgs {
    pub list: String,
    pub item: String,
    /// Mark as not done
    #[arg(long)]
    pub undo: bool,
}

#[derive(Args)]
pub struct EditArgs {
    pub list: String,
    pub item: String,
    #[arg(required = true, num_args = 1..)]
    pub text: Vec<String>,
}

#[derive(Args)]
pub struct PriorityArgs {
    pub list: String,
    pub item: String,
    /// none, low, medium or high
    pub level: Priority,
}

#[derive(Args)]
pub struct DueArgs {
    pub list: String,
    pub item: String,
    /// Date in words (내일 오후 3시) or ISO form (2025-03-06T15:00)
    #[arg(num_args = 0.., conflicts_with = "clear")]
    pub when: Vec<String>,
    /// Remove the due date
    #[arg(long)]
    pub clear: bool,
}

#[derive(Args)]
pub struct MvArgs {
    pub list: String,
    /// Current 1-based position among siblings
    pub from: usize,
    /// New 1-based position among siblings
    pub to: usize,
    /// Move among this task's subtasks instead of the top level
    #[arg(long)]
    pub parent: Option<String>,
}

#[derive(Args)]
pub struct SubtasksArgs {
    pub list: String,
    pub item: String,
    /// Print suggestions from the built-in table instead of asking the server
    #[arg(long)]
    pub offline: bool,
}
