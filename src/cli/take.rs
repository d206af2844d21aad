//! `take`: answer the survey in the terminal.
//!
//! Runs in-process against the configured database and coaching chain, or
//! against a running server with `--server`. Progress is saved to a draft
//! file after every change, so an interrupted run resumes where it left off.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::bootstrap::{default_draft_path, default_history_path};
use crate::coach::{Coach, build_coach};
use crate::config::Config;
use crate::db::{self, StoredTelemetry};
use crate::error::SubmitError;
use crate::responses::{ResponseService, Submitter};
use crate::schema::{AnswerValue, Question, QuestionKind, RatingItem, SurveySchema, crm_pain_points};
use crate::survey::{
    DraftStore, FileDraftStore, NextOutcome, Respondent, Screen, SurveySession,
};
use crate::telemetry::TelemetryDispatcher;
use crate::web::GatewayClient;

#[derive(Args, Debug, Clone)]
pub struct TakeArgs {
    /// Drive a running server instead of the local database
    #[arg(long, env = "SURVEY_SERVER_URL")]
    pub server: Option<String>,

    /// Discard any saved draft and start over
    #[arg(long)]
    pub fresh: bool,

    /// Draft file location
    #[arg(long, env = "SURVEY_DRAFT_PATH")]
    pub draft: Option<PathBuf>,
}

const HELP: &str = "Commands: :back  :skip  :examples  :describe  :reset  :help  :quit\n\
                    Press Enter on an answered question to keep the answer.";

/// What the respondent typed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Line(String),
    Back,
    Skip,
    Examples,
    Describe,
    Reset,
    Help,
    Quit,
}

fn parse_input(line: &str) -> Input {
    match line.trim() {
        ":back" | ":b" => Input::Back,
        ":skip" | ":s" => Input::Skip,
        ":examples" | ":e" => Input::Examples,
        ":describe" | ":d" => Input::Describe,
        ":reset" => Input::Reset,
        ":help" | ":h" | ":?" => Input::Help,
        ":quit" | ":q" => Input::Quit,
        other => Input::Line(other.to_string()),
    }
}

/// Thin wrapper over rustyline with file-backed history.
struct Prompter {
    editor: DefaultEditor,
    history: PathBuf,
}

impl Prompter {
    fn new(history: PathBuf) -> anyhow::Result<Self> {
        let mut editor = DefaultEditor::new()?;
        if editor.load_history(&history).is_err() {
            tracing::debug!(path = %history.display(), "No wizard history yet");
        }
        Ok(Self { editor, history })
    }

    /// `None` on Ctrl-C / Ctrl-D.
    fn ask(&mut self, prompt: &str) -> anyhow::Result<Option<Input>> {
        let line = tokio::task::block_in_place(|| self.editor.readline(prompt));
        match line {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(parse_input(&line)))
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&mut self) {
        if let Err(e) = self.editor.save_history(&self.history) {
            tracing::debug!(error = %e, "Could not save wizard history");
        }
    }
}

/// Run the `take` command.
pub async fn run_take_command(args: TakeArgs, config: &Config) -> anyhow::Result<()> {
    let drafts: Arc<dyn DraftStore> = Arc::new(FileDraftStore::new(
        args.draft.clone().unwrap_or_else(default_draft_path),
    ));
    if args.fresh {
        drafts.clear()?;
    }

    let schema: Arc<SurveySchema>;
    let coach: Arc<dyn Coach>;
    let submitter: Arc<dyn Submitter>;
    let telemetry: TelemetryDispatcher;
    match &args.server {
        Some(url) => {
            let client = Arc::new(GatewayClient::new(
                url,
                config.coach.provider_timeout + Duration::from_secs(5),
            )?);
            schema = Arc::new(client.schema().await?);
            println!("Connected to {}", client.base_url());
            coach = client.clone();
            submitter = client.clone();
            telemetry = TelemetryDispatcher::new(client);
        }
        None => {
            let database = db::connect(&config.database).await?;
            let mirror = database.is_durable().then(|| database.clone());
            schema = Arc::new(crm_pain_points());
            coach = Arc::new(build_coach(&config.coach)?);
            submitter = Arc::new(ResponseService::new(mirror));
            telemetry = TelemetryDispatcher::new(Arc::new(StoredTelemetry(database)));
        }
    }

    let mut session = SurveySession::new(schema, coach, submitter)
        .with_drafts(drafts)
        .with_telemetry(telemetry);
    if session.restore() {
        println!("Resuming your saved draft. Type :reset to start over.");
    }

    let mut prompter = Prompter::new(default_history_path())?;
    let finished = run_wizard(&mut session, &mut prompter).await;
    prompter.save();
    session.flush_telemetry().await;
    let finished = finished?;
    if !finished {
        println!("\nYour answers are saved. Run `crm-survey take` to continue.");
    }
    Ok(())
}

/// Returns `true` once the survey is submitted, `false` if the respondent
/// left early.
async fn run_wizard(session: &mut SurveySession, prompter: &mut Prompter) -> anyhow::Result<bool> {
    println!("{HELP}");
    loop {
        let view = session.view();
        let progress = view.progress;
        let keep_going = match view.screen {
            Screen::Completed => return Ok(true),
            Screen::Intro { title } => {
                let title = title.to_string();
                intro(session, prompter, &title).await?
            }
            Screen::Question {
                section,
                question,
                number,
                of,
                answer,
                messages,
                context,
            } => {
                if number == 1 {
                    println!("\n== {} ==\n{}", section.title, section.objective);
                }
                println!("\n[{progress}%] {number}/{of}");
                if let Some(context) = context {
                    println!("{context}");
                }
                print_question(question, answer);
                for message in messages {
                    println!("  ! {message}");
                }
                let question = question.clone();
                ask_question(session, prompter, &question).await?
            }
            Screen::RatingPage {
                section,
                items,
                page,
                pages,
                scale,
            } => {
                if page == 0 {
                    println!("\n== {} ==\n{}", section.title, section.objective);
                }
                println!("\n[{progress}%] Page {}/{pages}", page + 1);
                let items = items.to_vec();
                rate_page(session, prompter, &items, scale).await?
            }
            Screen::Table { section, questions } => {
                println!("\n== {} ==\n{}", section.title, section.objective);
                println!("[{progress}%]");
                let questions = questions.to_vec();
                fill_table(session, prompter, &questions).await?
            }
        };
        if !keep_going {
            return Ok(false);
        }
    }
}

async fn intro(
    session: &mut SurveySession,
    prompter: &mut Prompter,
    title: &str,
) -> anyhow::Result<bool> {
    println!("\n{title}\n");
    let Some(respondent) = ask_respondent(prompter, &session.state().respondent)? else {
        return Ok(false);
    };
    session.set_respondent(respondent);
    session.start();
    Ok(true)
}

/// Ask for name, email and company, keeping current values on Enter.
fn ask_respondent(
    prompter: &mut Prompter,
    current: &Respondent,
) -> anyhow::Result<Option<Respondent>> {
    let mut fields = Vec::with_capacity(3);
    for (label, value) in [
        ("Full name", &current.name),
        ("Email", &current.email),
        ("Company (optional)", &current.company),
    ] {
        let prompt = if value.is_empty() {
            format!("{label}: ")
        } else {
            format!("{label} [{value}]: ")
        };
        match prompter.ask(&prompt)? {
            None | Some(Input::Quit) => return Ok(None),
            Some(Input::Line(line)) if !line.is_empty() => fields.push(line),
            Some(_) => fields.push(value.clone()),
        }
    }
    let company = fields.pop().unwrap_or_default();
    let email = fields.pop().unwrap_or_default();
    let name = fields.pop().unwrap_or_default();
    Ok(Some(Respondent {
        name,
        email,
        company,
    }))
}

fn print_question(question: &Question, answer: Option<&AnswerValue>) {
    let required = if question.required { " *" } else { "" };
    println!("{}{required}", question.label);
    if let Some(explanation) = &question.explanation {
        println!("  {explanation}");
    }
    if let Some(hint) = &question.hint {
        println!("  {hint}");
    }
    if question.kind == QuestionKind::Scale {
        let (min, max) = question.scale_range();
        println!("  ({min}-{max})");
    }
    for (i, option) in question.options.iter().enumerate() {
        println!("  {}. {}", i + 1, option.label);
    }
    if let Some(answer) = answer.filter(|a| !a.is_empty()) {
        println!("  current: {}", describe_answer(question, answer));
    }
}

fn describe_answer(question: &Question, answer: &AnswerValue) -> String {
    match answer {
        AnswerValue::Number(n) => n.to_string(),
        AnswerValue::Text(s) => question.option_label(s).unwrap_or(s).to_string(),
        AnswerValue::Choices(ids) => ids
            .iter()
            .map(|id| question.option_label(id).unwrap_or(id))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// One question step. Returns `false` when the respondent quits.
async fn ask_question(
    session: &mut SurveySession,
    prompter: &mut Prompter,
    question: &Question,
) -> anyhow::Result<bool> {
    let Some(input) = prompter.ask("> ")? else {
        return Ok(false);
    };
    match input {
        Input::Quit => return Ok(false),
        Input::Help => println!("{HELP}"),
        Input::Back => session.back(),
        Input::Reset => session.reset(),
        Input::Examples => show_examples(session, question).await,
        Input::Describe => show_descriptions(session, question).await,
        Input::Skip => {
            let token = session.step_token();
            match session.skip_current(token).await {
                NextOutcome::Ignored => println!("  Only open-text questions can be skipped."),
                outcome => report(session, prompter, outcome).await?,
            }
        }
        Input::Line(line) => {
            // Enter keeps the current answer; an unanswered required
            // question is then blocked by validation.
            if !line.is_empty() {
                match parse_answer(question, &line) {
                    Ok(value) => {
                        session.answer(&question.id, Some(value));
                        if wants_other(question, session) {
                            ask_other(session, prompter, question)?;
                        }
                    }
                    Err(message) => {
                        println!("  ! {message}");
                        return Ok(true);
                    }
                }
            }
            let token = session.step_token();
            let outcome = session.next(token).await;
            report(session, prompter, outcome).await?;
        }
    }
    Ok(true)
}

/// Whether the current answer picks the "Other (specify)" option.
fn wants_other(question: &Question, session: &SurveySession) -> bool {
    let Some(other) = question.options.iter().find(|o| o.is_other()) else {
        return false;
    };
    match session.state().answers.get(&question.id) {
        Some(AnswerValue::Text(id)) => *id == other.id,
        Some(AnswerValue::Choices(ids)) => ids.contains(&other.id),
        _ => false,
    }
}

fn ask_other(
    session: &mut SurveySession,
    prompter: &mut Prompter,
    question: &Question,
) -> anyhow::Result<()> {
    if let Some(Input::Line(text)) = prompter.ask("  Please specify: ")?
        && !text.is_empty()
    {
        session.answer(&question.other_key(), Some(AnswerValue::Text(text)));
    }
    Ok(())
}

async fn report(
    session: &mut SurveySession,
    prompter: &mut Prompter,
    outcome: NextOutcome,
) -> anyhow::Result<()> {
    match outcome {
        NextOutcome::Moved { ack } => {
            if let Some(ack) = ack {
                println!("  {ack}");
            }
        }
        NextOutcome::Ignored => {}
        NextOutcome::Blocked { messages } => {
            for message in messages {
                println!("  ! {message}");
            }
        }
        NextOutcome::Submitted(receipt) => {
            println!("\nThank you! Your response was recorded ({}).", receipt.saved.id);
            if let Some(warning) = receipt.warning {
                println!("  {warning}");
            }
        }
        NextOutcome::SubmitFailed(e @ (SubmitError::MissingIdentity | SubmitError::InvalidEmail)) => {
            let hint = match e {
                SubmitError::MissingIdentity => "Please enter your name and email first.",
                _ => "Please enter a valid email address.",
            };
            println!("  ! {hint}");
            if let Some(respondent) = ask_respondent(prompter, &session.state().respondent)? {
                session.set_respondent(respondent);
            }
        }
        NextOutcome::SubmitFailed(e) => {
            println!("  ! Could not submit: {e}. Your answers are saved; press Enter to retry.");
        }
    }
    Ok(())
}

async fn show_examples(session: &SurveySession, question: &Question) {
    let role = session
        .state()
        .answers
        .get("primary_role")
        .and_then(AnswerValue::as_text)
        .map(str::to_string);
    match session.coach().examples(&question.id, role.as_deref()).await {
        Ok(examples) => {
            for example in examples {
                println!("  - {example}");
            }
        }
        Err(e) => println!("  No examples available ({e})."),
    }
}

async fn show_descriptions(session: &SurveySession, question: &Question) {
    if question.options.is_empty() {
        println!("  This question has no options to describe.");
        return;
    }
    let labels: Vec<String> = question.options.iter().map(|o| o.label.clone()).collect();
    match session.coach().describe_options(&question.id, &labels).await {
        Ok(descriptions) => {
            for label in &labels {
                let text = descriptions.get(label).map(String::as_str).unwrap_or("");
                println!("  {label}: {text}");
            }
        }
        Err(e) => println!("  No descriptions available ({e})."),
    }
}

async fn rate_page(
    session: &mut SurveySession,
    prompter: &mut Prompter,
    items: &[RatingItem],
    (min, max): (u8, u8),
) -> anyhow::Result<bool> {
    for item in items {
        let current = session.state().ratings.get(&item.id).copied();
        if let Some(description) = &item.description {
            println!("  {description}");
        }
        let prompt = match current {
            Some(value) => format!("{} ({min}-{max}) [{value}]: ", item.label),
            None => format!("{} ({min}-{max}): ", item.label),
        };
        loop {
            match prompter.ask(&prompt)? {
                None | Some(Input::Quit) => return Ok(false),
                Some(Input::Back) => {
                    session.back();
                    return Ok(true);
                }
                Some(Input::Line(line)) if line.is_empty() => break,
                Some(Input::Line(line)) => match parse_rating(&line, (min, max)) {
                    Ok(value) => {
                        session.rate(&item.id, value);
                        break;
                    }
                    Err(message) => println!("  ! {message}"),
                },
                Some(_) => println!("{HELP}"),
            }
        }
    }
    let token = session.step_token();
    let outcome = session.next(token).await;
    report(session, prompter, outcome).await?;
    Ok(true)
}

async fn fill_table(
    session: &mut SurveySession,
    prompter: &mut Prompter,
    questions: &[Question],
) -> anyhow::Result<bool> {
    for question in questions {
        let current = session.state().answers.get(&question.id).cloned();
        print_question(question, current.as_ref());
        loop {
            match prompter.ask("> ")? {
                None | Some(Input::Quit) => return Ok(false),
                Some(Input::Back) => {
                    session.back();
                    return Ok(true);
                }
                Some(Input::Line(line)) if line.is_empty() => break,
                Some(Input::Line(line)) => match parse_answer(question, &line) {
                    Ok(value) => {
                        session.answer(&question.id, Some(value));
                        break;
                    }
                    Err(message) => println!("  ! {message}"),
                },
                Some(_) => println!("{HELP}"),
            }
        }
    }
    let token = session.step_token();
    let outcome = session.next(token).await;
    report(session, prompter, outcome).await?;
    Ok(true)
}

/// Turn a typed line into an answer for `question`.
///
/// Choices accept a 1-based number or an option id; multi-select takes a
/// comma-separated list.
fn parse_answer(question: &Question, line: &str) -> Result<AnswerValue, String> {
    match question.kind {
        QuestionKind::Text | QuestionKind::LongText | QuestionKind::Number => {
            Ok(AnswerValue::Text(line.to_string()))
        }
        QuestionKind::Scale => line
            .trim()
            .parse::<f64>()
            .map(AnswerValue::Number)
            .map_err(|_| "Please enter a number.".to_string()),
        QuestionKind::MultipleChoice => pick_option(question, line).map(AnswerValue::Text),
        QuestionKind::MultiSelect => {
            let mut picked = Vec::new();
            for part in line.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let id = pick_option(question, part)?;
                if !picked.contains(&id) {
                    picked.push(id);
                }
            }
            Ok(AnswerValue::Choices(picked))
        }
    }
}

fn pick_option(question: &Question, token: &str) -> Result<String, String> {
    let token = token.trim();
    if let Ok(n) = token.parse::<usize>()
        && let Some(option) = n.checked_sub(1).and_then(|i| question.options.get(i))
    {
        return Ok(option.id.clone());
    }
    question
        .options
        .iter()
        .find(|o| o.id == token || o.label.eq_ignore_ascii_case(token))
        .map(|o| o.id.clone())
        .ok_or_else(|| format!("'{token}' is not one of the options."))
}

fn parse_rating(line: &str, (min, max): (u8, u8)) -> Result<u8, String> {
    match line.trim().parse::<u8>() {
        Ok(n) if (min..=max).contains(&n) => Ok(n),
        _ => Err(format!("Please enter a whole number from {min} to {max}.")),
    }
}
