use std::sync::Arc;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::api::ApiClient;
use crate::io::auth::{AuthClient, Provider};
use crate::io::config_io;
use crate::io::local_store::LocalStore;
use crate::model::config::ClientConfig;
use crate::model::datetime;
use crate::model::project::Project;
use crate::model::task::TaskNode;
use crate::ops::suggest::suggest_subtasks;
use crate::ops::tree_ops;
use crate::ops::validate::validate_keyword;
use crate::parse::nlp_parser;
use crate::sync::{ProjectSession, SyncEvent};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run one command. `config` already carries the environment and flag
/// overrides.
pub fn dispatch(cli: Cli, config: ClientConfig) -> CmdResult {
    let json = cli.json;

    match cli.command {
        // Offline
        Commands::Parse(args) => cmd_parse(args, json),
        Commands::Examples(args) => cmd_examples(args, json),
        Commands::Suggest(args) => cmd_suggest(args, json),
        Commands::Config(cmd) => cmd_config(cmd, &config),
        Commands::Prefs(cmd) => cmd_prefs(cmd, &config),

        // Account
        Commands::Login(args) => cmd_login(args, &*connect(&config)?),
        Commands::Register(args) => cmd_register(args, &*connect(&config)?),
        Commands::Logout => {
            let api = connect(&config)?;
            AuthClient::new(&api, api.store()).logout();
            println!("signed out");
            Ok(())
        }
        Commands::Auth(cmd) => cmd_auth(cmd, &*connect(&config)?),

        // Projects
        Commands::Projects => cmd_projects(&*connect(&config)?, json),
        Commands::Show(args) => cmd_show(args, &*connect(&config)?, json),
        Commands::Generate(args) => cmd_generate(args, &*connect(&config)?, json),
        Commands::Rename(args) => cmd_rename(args, connect(&config)?),
        Commands::DeleteProject(args) => cmd_delete_project(args, &*connect(&config)?),

        // Tasks
        Commands::Add(args) => cmd_add(args, connect(&config)?, json),
        Commands::Toggle(args) => cmd_toggle(args, connect(&config)?, json),
        Commands::Edit(args) => cmd_edit(args, connect(&config)?),
        Commands::Priority(args) => cmd_priority(args, connect(&config)?),
        Commands::Due(args) => cmd_due(args, connect(&config)?),
        Commands::Rm(args) => cmd_rm(args, connect(&config)?),
        Commands::Mv(args) => cmd_mv(args, connect(&config)?, json),
        Commands::Subtasks(args) => cmd_subtasks(args, connect(&config)?, json),
    }
}

fn connect(config: &ClientConfig) -> Result<Arc<ApiClient>, Box<dyn std::error::Error>> {
    let store = LocalStore::open(&config_io::storage_dir(config));
    let api = ApiClient::new(&config.api, store)?;
    tracing::debug!(base_url = api.base_url(), "connected");
    Ok(Arc::new(api))
}

// ---------------------------------------------------------------------------
// Offline commands
// ---------------------------------------------------------------------------

fn cmd_parse(args: ParseArgs, json: bool) -> CmdResult {
    let text = args.text.join(" ");
    let now = match args.now {
        Some(ref s) => datetime::parse_flexible(s)
            .map(|dt| dt.naive_local())
            .ok_or_else(|| format!("invalid --now value: {}", s))?,
        None => datetime::now_local(),
    };
    let parsed = nlp_parser::parse_at(&text, now);

    if json {
        println!("{}", serde_json::to_string_pretty(&parsed_to_json(&parsed))?);
    } else {
        for line in format_parsed(&parsed) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_examples(args: ExamplesArgs, json: bool) -> CmdResult {
    let examples = nlp_parser::parser_examples(args.lang.code());
    if json {
        println!("{}", serde_json::to_string_pretty(examples)?);
    } else {
        for example in examples {
            println!("{}", example);
        }
    }
    Ok(())
}

fn cmd_suggest(args: SuggestArgs, json: bool) -> CmdResult {
    let task = args.text.join(" ");
    print_suggestions(&task, json)
}

fn print_suggestions(task: &str, json: bool) -> CmdResult {
    let subtasks = suggest_subtasks(task);
    if json {
        let out = SuggestionsJson { task, subtasks };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for (i, subtask) in subtasks.iter().enumerate() {
            println!("{}. {}", i + 1, subtask);
        }
    }
    Ok(())
}

fn cmd_config(cmd: ConfigCmd, config: &ClientConfig) -> CmdResult {
    let path = config_io::config_path();
    match cmd.action {
        ConfigAction::Path => {
            println!("{}", path.display());
        }
        ConfigAction::Get(args) => {
            let (_, doc) = config_io::read_config(&path)?;
            let value = match config_io::get_value(&doc, &args.key)? {
                Some(v) => v,
                None => effective_value(config, &args.key),
            };
            println!("{}", value);
        }
        ConfigAction::Set(args) => {
            let (_, mut doc) = config_io::read_config(&path)?;
            config_io::set_value(&mut doc, &args.key, &args.value)?;
            config_io::write_config(&path, &doc)?;
            tracing::info!(key = %args.key, "config updated");
            println!("{} = {}", args.key, args.value);
        }
    }
    Ok(())
}

fn cmd_prefs(cmd: PrefsCmd, config: &ClientConfig) -> CmdResult {
    let store = LocalStore::open(&config_io::storage_dir(config));
    let mut prefs = store
        .load_preferences()
        .and_then(|v| match v {
            serde_json::Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_default();
    match cmd.action {
        PrefsAction::Show => {
            println!("{}", serde_json::to_string_pretty(&prefs)?);
            return Ok(());
        }
        PrefsAction::Set(args) => {
            let value = serde_json::from_str(&args.value)
                .unwrap_or_else(|_| serde_json::Value::String(args.value.clone()));
            println!("{} = {}", args.key, value);
            prefs.insert(args.key, value);
        }
        PrefsAction::Unset(args) => {
            if prefs.remove(&args.key).is_none() {
                return Err(format!("no preference named {}", args.key).into());
            }
        }
        PrefsAction::Clear => {
            store.remove_preferences();
            return Ok(());
        }
    }
    if prefs.is_empty() {
        store.remove_preferences();
    } else {
        store.save_preferences(&serde_json::Value::Object(prefs));
    }
    Ok(())
}

/// Value in effect for a key the file leaves unset.
fn effective_value(config: &ClientConfig, key: &str) -> String {
    match key {
        "api.base_url" => config.api.base_url.clone(),
        "api.timeout_secs" => config.api.timeout_secs.to_string(),
        "log.filter" => config.log.filter.clone().unwrap_or_default(),
        "storage.dir" => config_io::storage_dir(config).display().to_string(),
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

fn cmd_login(args: LoginArgs, api: &ApiClient) -> CmdResult {
    let username = AuthClient::username_for(&args.user);
    AuthClient::new(api, api.store()).login(username, &args.password)?;
    println!("signed in as {}", username);
    Ok(())
}

fn cmd_register(args: RegisterArgs, api: &ApiClient) -> CmdResult {
    let username = args
        .username
        .as_deref()
        .unwrap_or_else(|| AuthClient::username_for(&args.email));
    AuthClient::new(api, api.store()).register(username, &args.password, Some(&args.email))?;
    println!("registered {}; sign in with `tn login {}`", username, username);
    Ok(())
}

fn cmd_auth(cmd: AuthCmd, api: &ApiClient) -> CmdResult {
    let auth = AuthClient::new(api, api.store());
    match cmd.action {
        AuthAction::Social(args) => {
            let provider = match args.provider {
                ProviderArg::Google => Provider::Google,
                ProviderArg::Github => Provider::Github,
            };
            auth.social_login(
                provider,
                &args.id_token,
                &args.email,
                args.display_name.as_deref(),
                args.photo_url.as_deref(),
            )?;
        }
        AuthAction::Naver(args) => {
            auth.naver_callback(&args.code, &args.state, &args.redirect_uri)?;
        }
        AuthAction::Kakao(args) => {
            auth.kakao_callback(&args.code, &args.redirect_uri)?;
        }
    }
    println!("signed in");
    Ok(())
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

fn cmd_projects(api: &ApiClient, json: bool) -> CmdResult {
    let projects = api.list_projects()?;
    if json {
        let out: Vec<_> = projects
            .iter()
            .enumerate()
            .map(|(i, p)| summary_to_json(i + 1, p))
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if projects.is_empty() {
        println!("(no projects; create one with `tn generate <keyword>`)");
    } else {
        for line in format_project_rows(&projects) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_show(args: ListArg, api: &ApiClient, json: bool) -> CmdResult {
    let project = load_project(api, &args.list)?;
    print_project(&project, json)
}

fn cmd_generate(args: GenerateArgs, api: &ApiClient, json: bool) -> CmdResult {
    let keyword = args.keyword.join(" ");
    let keyword = validate_keyword(&keyword)?;
    let mut project = api.generate_project(keyword)?;
    project.items = tree_ops::sort_by_completion_then_order(&project.items);
    print_project(&project, json)
}

fn cmd_rename(args: RenameArgs, api: Arc<ApiClient>) -> CmdResult {
    let session = open_session(api, &args.list)?;
    session.rename_project(&args.keyword.join(" "))?;
    println!("renamed to {}", session.snapshot().keyword);
    Ok(())
}

fn cmd_delete_project(args: ListArg, api: &ApiClient) -> CmdResult {
    let project = load_project(api, &args.list)?;
    api.delete_project(&project.id)?;
    println!("deleted {}", project.keyword);
    Ok(())
}

/// A project by id or by its 1-based position in the project list, with
/// every level sorted the way it is shown.
fn load_project(api: &ApiClient, reference: &str) -> Result<Project, Box<dyn std::error::Error>> {
    let mut project = match reference.parse::<usize>() {
        Ok(position) => {
            let projects = api.list_projects()?;
            position
                .checked_sub(1)
                .and_then(|i| projects.into_iter().nth(i))
                .ok_or_else(|| format!("no project at position {}", position))?
        }
        Err(_) => api.get_project(reference)?,
    };
    project.items = tree_ops::sort_by_completion_then_order(&project.items);
    Ok(project)
}

fn open_session(
    api: Arc<ApiClient>,
    reference: &str,
) -> Result<ProjectSession<ApiClient>, Box<dyn std::error::Error>> {
    let project = load_project(&api, reference)?;
    Ok(ProjectSession::new(project, api))
}

fn print_project(project: &Project, json: bool) -> CmdResult {
    if json {
        println!("{}", serde_json::to_string_pretty(&project_to_json(project))?);
    } else {
        for line in format_project(project) {
            println!("{}", line);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Resolve a task reference: a position path ("2.1") or an id.
/// Returns the id and the position path.
fn resolve_item(tree: &[TaskNode], reference: &str) -> Result<(String, String), String> {
    let positions: Option<Vec<usize>> = reference
        .split('.')
        .map(|part| part.parse::<usize>().ok().filter(|&n| n > 0))
        .collect();
    if let Some(node) = positions.and_then(|p| node_at(tree, &p)) {
        return Ok((node.id.clone(), reference.to_string()));
    }
    path_of(tree, reference, "")
        .map(|path| (reference.to_string(), path))
        .ok_or_else(|| format!("task not found: {}", reference))
}

fn node_at<'a>(tree: &'a [TaskNode], positions: &[usize]) -> Option<&'a TaskNode> {
    let (first, rest) = positions.split_first()?;
    let node = tree.get(first - 1)?;
    if rest.is_empty() {
        Some(node)
    } else {
        node_at(&node.children, rest)
    }
}

fn path_of(nodes: &[TaskNode], id: &str, prefix: &str) -> Option<String> {
    nodes.iter().enumerate().find_map(|(i, node)| {
        let path = if prefix.is_empty() {
            (i + 1).to_string()
        } else {
            child_path(prefix, i)
        };
        if node.id == id {
            Some(path)
        } else {
            path_of(&node.children, id, &path)
        }
    })
}

fn open_item(
    api: Arc<ApiClient>,
    list: &str,
    item: &str,
) -> Result<(ProjectSession<ApiClient>, String, String), Box<dyn std::error::Error>> {
    let session = open_session(api, list)?;
    let (id, path) = resolve_item(&session.snapshot().items, item)?;
    Ok((session, id, path))
}

fn print_node(node: &TaskNode, json: bool) -> CmdResult {
    if json {
        println!("{}", serde_json::to_string_pretty(node)?);
    } else {
        for line in format_task_tree(node, &node.id, 0) {
            println!("{}", line);
        }
    }
    Ok(())
}

fn cmd_add(args: AddArgs, api: Arc<ApiClient>, json: bool) -> CmdResult {
    let session = open_session(api, &args.list)?;
    let text = args.text.join(" ");
    let node = match args.parent {
        Some(ref parent) => {
            let (parent_id, _) = resolve_item(&session.snapshot().items, parent)?;
            session.quick_add(&text, Some(&parent_id))?
        }
        None if args.quick => session.quick_add(&text, None)?,
        None => session.add_from_text(&text)?,
    };
    print_node(&node, json)
}

fn cmd_toggle(args: ToggleArgs, api: Arc<ApiClient>, json: bool) -> CmdResult {
    let (session, id, _) = open_item(api, &args.list, &args.item)?;
    session.toggle(&id, !args.undo)?;
    session.wait_idle();
    for event in session.poll() {
        if let SyncEvent::Failed { message } = event {
            return Err(format!("could not save: {}", message).into());
        }
    }
    print_project(&session.committed(), json)
}

fn cmd_edit(args: EditArgs, api: Arc<ApiClient>) -> CmdResult {
    let (session, id, path) = open_item(api, &args.list, &args.item)?;
    session.edit_description(&id, &args.text.join(" "))?;
    print_updated(&session, &id, &path)
}

fn cmd_priority(args: PriorityArgs, api: Arc<ApiClient>) -> CmdResult {
    let (session, id, path) = open_item(api, &args.list, &args.item)?;
    session.set_priority(&id, args.level)?;
    print_updated(&session, &id, &path)
}

fn cmd_due(args: DueArgs, api: Arc<ApiClient>) -> CmdResult {
    let due = if args.clear {
        None
    } else {
        let text = args.when.join(" ");
        if text.trim().is_empty() {
            return Err("give a date or --clear".into());
        }
        let due = datetime::parse_flexible(&text).or_else(|| nlp_parser::parse(&text).due_date);
        Some(due.ok_or_else(|| format!("could not read a date from '{}'", text))?)
    };

    let (session, id, path) = open_item(api, &args.list, &args.item)?;
    session.set_due_date(&id, due)?;
    print_updated(&session, &id, &path)
}

fn cmd_rm(args: ItemArgs, api: Arc<ApiClient>) -> CmdResult {
    let (session, id, path) = open_item(api, &args.list, &args.item)?;
    session.delete_item(&id)?;
    println!("deleted {} ({})", path, id);
    Ok(())
}

fn cmd_mv(args: MvArgs, api: Arc<ApiClient>, json: bool) -> CmdResult {
    let session = open_session(api, &args.list)?;
    let tree = session.snapshot().items;
    let (parent_id, siblings) = match args.parent {
        Some(ref parent) => {
            let (id, _) = resolve_item(&tree, parent)?;
            let count = tree_ops::find_by_id(&tree, &id).map_or(0, |n| n.children.len());
            (Some(id), count)
        }
        None => (None, tree.len()),
    };
    for position in [args.from, args.to] {
        if position == 0 || position > siblings {
            return Err(format!("position {} is out of range (1-{})", position, siblings).into());
        }
    }

    session.move_item(parent_id.as_deref(), args.from - 1, args.to - 1)?;
    session.save_order()?;
    print_project(&session.committed(), json)
}

fn cmd_subtasks(args: SubtasksArgs, api: Arc<ApiClient>, json: bool) -> CmdResult {
    let (session, id, _) = open_item(api, &args.list, &args.item)?;
    if args.offline {
        let tree = session.snapshot().items;
        let description = tree_ops::find_by_id(&tree, &id)
            .map(|n| n.description.clone())
            .unwrap_or_default();
        return print_suggestions(&description, json);
    }
    let node = session.generate_subtasks(&id)?;
    print_node(&node, json)
}

fn print_updated(session: &ProjectSession<ApiClient>, id: &str, path: &str) -> CmdResult {
    let tree = session.committed().items;
    if let Some(node) = tree_ops::find_by_id(&tree, id) {
        println!("{}", format_task_line(node, path));
    }
    Ok(())
}
