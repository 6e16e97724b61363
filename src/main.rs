use std::collections::BTreeSet;
use std::fs;
use std::io::{self, BufRead, Write};

use dotenv::dotenv;
use testing_center::config::Config;
use testing_center::quiz::authoring::{DraftFile, TestDraft};
use testing_center::quiz::error::SessionError;
use testing_center::quiz::sampler::assemble;
use testing_center::quiz::session::{QuestionStatus, TestSession};
use testing_center::quiz::{QuestionKind, Response, TestId};
use testing_center::roster::{self, RosterRow};
use testing_center::seed;
use testing_center::storage::{Identity, StorageContext};

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Clone, Default)]
pub enum State {
    #[default]
    Start,
    ReceiveLogin,
    ReceivePassword {
        login: String,
    },
    TeacherMenu,
    StudentChooseTest {
        full_name: String,
    },
    StudentConfirmTest {
        full_name: String,
        test_id: TestId,
        test_name: String,
    },
    StudentSession {
        full_name: String,
        test_name: String,
        session: TestSession,
    },
}

struct Dialogue {
    state: State,
}

impl Dialogue {
    fn update(&mut self, state: State) {
        self.state = state;
    }
}

struct Context {
    storage: StorageContext,
    config: Config,
}

fn main() -> HandlerResult {
    dotenv().ok();
    pretty_env_logger::init();
    log::info!("Starting testing center...");

    let config = Config::from_env()?;
    let mut storage = StorageContext::open(&config)?;
    storage
        .storage_mut()
        .ensure_teacher(&config.teacher_login, &config.teacher_password)?;
    if config.seed_demo {
        seed::seed_if_empty(storage.storage_mut())?;
    }

    let mut ctx = Context { storage, config };
    let mut dialogue = Dialogue {
        state: State::Start,
    };

    start(&mut dialogue)?;
    prompt()?;
    for line in io::stdin().lock().lines() {
        let line = line?;
        // Handlers replace the state on success; on error the previous one stays.
        let result = match dialogue.state.clone() {
            State::Start => start(&mut dialogue),
            State::ReceiveLogin => receive_login(&mut dialogue, &line),
            State::ReceivePassword { login } => receive_password(&ctx, &mut dialogue, login, &line),
            State::TeacherMenu => teacher_menu(&mut ctx, &mut dialogue, &line),
            State::StudentChooseTest { full_name } => {
                choose_test(&ctx, &mut dialogue, full_name, &line)
            }
            State::StudentConfirmTest {
                full_name,
                test_id,
                test_name,
            } => confirm_test(&ctx, &mut dialogue, (full_name, test_id, test_name), &line),
            State::StudentSession {
                full_name,
                test_name,
                session,
            } => take_test(&ctx, &mut dialogue, (full_name, test_name, session), &line),
        };
        if let Err(err) = result {
            log::error!("{}", err);
            println!("Ошибка: {}", err);
        }
        prompt()?;
    }

    log::info!("Input closed, shutting down");
    Ok(())
}

fn prompt() -> io::Result<()> {
    print!("> ");
    io::stdout().flush()
}

/// Splits `word rest`; `rest` is kept verbatim so free-text answers are not altered.
fn split_command(line: &str) -> (&str, &str) {
    let line = line.trim_start();
    line.split_once(' ').unwrap_or((line.trim_end(), ""))
}

/// Parses a 1-based number into a 0-based index below `len`.
fn parse_index(arg: &str, len: usize) -> Option<usize> {
    arg.trim()
        .parse::<usize>()
        .ok()
        .filter(|n| (1..=len).contains(n))
        .map(|n| n - 1)
}

const GREETING_TEXT: &str = "Добро пожаловать в центр тестирования! Введите логин.";
fn start(dialogue: &mut Dialogue) -> HandlerResult {
    println!("{}", GREETING_TEXT);
    dialogue.update(State::ReceiveLogin);
    Ok(())
}

fn receive_login(dialogue: &mut Dialogue, line: &str) -> HandlerResult {
    let login = line.trim();
    if login.is_empty() {
        println!("Пожалуйста, введите логин");
        return Ok(());
    }
    println!("Пароль:");
    dialogue.update(State::ReceivePassword {
        login: login.to_string(),
    });
    Ok(())
}

fn receive_password(
    ctx: &Context,
    dialogue: &mut Dialogue,
    login: String,
    line: &str,
) -> HandlerResult {
    match ctx.storage.storage().authenticate(&login, line.trim())? {
        Some(identity @ Identity::Teacher { .. }) => {
            log::info!("Logged in as {}", identity);
            print_teacher_help();
            dialogue.update(State::TeacherMenu);
        }
        Some(Identity::Student { full_name, .. }) => {
            log::info!("Logged in as student {}", full_name);
            println!("Здравствуйте, {}!", full_name);
            list_tests(ctx)?;
            dialogue.update(State::StudentChooseTest { full_name });
        }
        None => {
            log::warn!("Failed login attempt for '{}'", login);
            println!("Неверный логин или пароль. Введите логин.");
            dialogue.update(State::ReceiveLogin);
        }
    }
    Ok(())
}

fn print_teacher_help() {
    println!("Команды преподавателя:");
    println!("  tests                   список тестов");
    println!("  import-test <файл>      загрузить тест из JSON");
    println!("  export-test <N> <файл>  выгрузить тест N в JSON");
    println!("  edit-test <N> <файл>    заменить тест N содержимым JSON");
    println!("  import-roster <файл>    загрузить список студентов из JSON");
    println!("  groups                  список групп");
    println!("  credentials <группа>    логины и пароли группы");
    println!("  logout                  выйти");
}

fn list_tests(ctx: &Context) -> HandlerResult {
    let tests = ctx.storage.storage().list_tests()?;
    if tests.is_empty() {
        println!("Тестов пока нет");
        return Ok(());
    }
    println!("Доступные тесты:");
    for (number, test) in tests.iter().enumerate() {
        println!("  {}. {}", number + 1, test);
    }
    Ok(())
}

fn teacher_menu(ctx: &mut Context, dialogue: &mut Dialogue, line: &str) -> HandlerResult {
    let (command, arg) = split_command(line);
    let arg = arg.trim();
    match command {
        "tests" => list_tests(ctx)?,
        "import-test" => {
            let raw = fs::read_to_string(arg)?;
            let file: DraftFile = serde_json::from_str(&raw)?;
            let (draft, quotas) = file.into_draft();
            let id = draft.commit(ctx.storage.storage_mut(), &quotas)?;
            println!("Тест '{}' сохранён под номером {}", draft.name().trim(), id);
        }
        "export-test" | "edit-test" => {
            let (number, path) = split_command(arg);
            let tests = ctx.storage.storage().list_tests()?;
            let Some(index) = parse_index(number, tests.len()) else {
                println!("Укажите номер теста из списка");
                return Ok(());
            };
            let test = ctx.storage.storage().load_test(tests[index].id)?;
            if command == "export-test" {
                let file = DraftFile::from_test(&test)?;
                fs::write(path.trim(), serde_json::to_string_pretty(&file)?)?;
                println!("Тест '{}' выгружен в {}", test.name, path.trim());
            } else {
                let raw = fs::read_to_string(path.trim())?;
                let file: DraftFile = serde_json::from_str(&raw)?;
                let mut draft = TestDraft::edit(&test)?;
                let quotas = draft.apply(file)?;
                let id = draft.commit(ctx.storage.storage_mut(), &quotas)?;
                println!("Тест '{}' обновлён (номер {})", draft.name().trim(), id);
            }
        }
        "import-roster" => {
            let raw = fs::read_to_string(arg)?;
            let rows: Vec<RosterRow> = serde_json::from_str(&raw)?;
            let issued = roster::import(ctx.storage.storage_mut(), &rows, &mut rand::thread_rng())?;
            println!("Добавлено студентов: {}", issued.len());
            for creds in issued {
                println!(
                    "  {} ({}): {} / {}",
                    creds.full_name, creds.group, creds.login, creds.password
                );
            }
        }
        "groups" => {
            for group in ctx.storage.storage().list_groups()? {
                println!("  {}. {}", group.id, group.name);
            }
        }
        "credentials" => {
            let Ok(group_id) = arg.parse() else {
                println!("Укажите номер группы");
                return Ok(());
            };
            for creds in roster::export(ctx.storage.storage(), group_id)? {
                println!("  {}: {} / {}", creds.full_name, creds.login, creds.password);
            }
        }
        "logout" => start(dialogue)?,
        _ => print_teacher_help(),
    }
    Ok(())
}

fn choose_test(ctx: &Context, dialogue: &mut Dialogue, full_name: String, line: &str) -> HandlerResult {
    let tests = ctx.storage.storage().list_tests()?;
    if line.trim() == "logout" {
        return start(dialogue);
    }
    let Some(index) = parse_index(line, tests.len()) else {
        println!("Пожалуйста, введите номер теста из списка (или logout)");
        return Ok(());
    };
    let test = &tests[index];
    println!("Начать тест «{}»? (да/нет)", test.name);
    dialogue.update(State::StudentConfirmTest {
        full_name,
        test_id: test.id,
        test_name: test.name.clone(),
    });
    Ok(())
}

fn confirm_test(
    ctx: &Context,
    dialogue: &mut Dialogue,
    (full_name, test_id, test_name): (String, TestId, String),
    line: &str,
) -> HandlerResult {
    if !matches!(line.trim().to_lowercase().as_str(), "да" | "д" | "yes" | "y") {
        list_tests(ctx)?;
        dialogue.update(State::StudentChooseTest { full_name });
        return Ok(());
    }

    let test = ctx.storage.storage().load_test(test_id)?;
    let questions = assemble(&test, ctx.config.item_order, &mut rand::thread_rng());
    let session = match TestSession::start(questions) {
        Ok(session) => session,
        Err(SessionError::Empty) => {
            println!("В этом тесте нет вопросов");
            list_tests(ctx)?;
            dialogue.update(State::StudentChooseTest { full_name });
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    println!("Команды: open <номер>, next, answer ..., pick <номер>, list, finish");
    render(&session);
    dialogue.update(State::StudentSession {
        full_name,
        test_name,
        session,
    });
    Ok(())
}

fn render(session: &TestSession) {
    let index = session.current();
    let sq = session.current_question();
    println!();
    println!("Вопрос {} из {}", index + 1, session.len());
    if session.statuses()[index] == QuestionStatus::Answered {
        println!("(ответ уже дан)");
    }
    println!("{}", sq.question.body);

    match &sq.question.kind {
        QuestionKind::FreeText { .. } => println!("Ответ: answer <текст>"),
        QuestionKind::MultiSelect { options } => {
            for (number, option) in options.iter().enumerate() {
                println!("  {}. {}", number + 1, option.text);
            }
            println!("Ответ: answer <номера через пробел>");
        }
        QuestionKind::Ordering { items } => {
            let labels = session.tracker().map(|t| t.labels()).unwrap_or_default();
            for (number, item) in items.iter().enumerate() {
                let mark = match labels.get(number).copied().flatten() {
                    Some(rank) => format!("[{}]", rank),
                    None => "[ ]".to_string(),
                };
                println!("  {}. {} {}", number + 1, mark, item.text);
            }
            println!("Отмечайте пункты по порядку: pick <номер>; затем answer");
        }
    }
}

fn take_test(
    ctx: &Context,
    dialogue: &mut Dialogue,
    (full_name, test_name, mut session): (String, String, TestSession),
    line: &str,
) -> HandlerResult {
    let (command, arg) = split_command(line);
    match command {
        "open" => match parse_index(arg, session.len()) {
            Some(index) => {
                session.open(index)?;
                render(&session);
            }
            None => println!("Нет вопроса с таким номером"),
        },
        "next" => match session.advance() {
            Some(_) => render(&session),
            None => println!("Все вопросы отвечены, введите finish"),
        },
        "pick" => {
            let total = session.tracker().map_or(0, |t| t.total());
            match parse_index(arg, total) {
                Some(slot) => {
                    session.toggle_item(slot)?;
                    render(&session);
                }
                None => println!("Нет пункта с таким номером"),
            }
        }
        "list" => {
            for (number, status) in session.statuses().iter().enumerate() {
                let label = match status {
                    QuestionStatus::NotViewed => "не открыт",
                    QuestionStatus::Viewed => "открыт",
                    QuestionStatus::Answered => "отвечен",
                    QuestionStatus::Skipped => "пропущен",
                };
                println!("  {}. {}", number + 1, label);
            }
        }
        "answer" => {
            if session.statuses()[session.current()] == QuestionStatus::Answered {
                println!("На этот вопрос уже дан ответ");
            } else if !session.can_submit() {
                println!("Сначала расставьте все пункты");
            } else {
                let verdict = match &session.current_question().question.kind {
                    QuestionKind::FreeText { .. } => {
                        session.submit(&Response::FreeText(arg.to_string()))?
                    }
                    QuestionKind::MultiSelect { options } => {
                        let picked: Option<BTreeSet<String>> = arg
                            .split(|c: char| c == ',' || c.is_whitespace())
                            .filter(|part| !part.is_empty())
                            .map(|part| parse_index(part, options.len()).map(|i| options[i].text.clone()))
                            .collect();
                        let Some(picked) = picked else {
                            println!("Нет варианта с таким номером");
                            return keep_session(dialogue, full_name, test_name, session);
                        };
                        session.submit(&Response::MultiSelect(picked))?
                    }
                    QuestionKind::Ordering { .. } => session.submit_ordering()?,
                };
                log::debug!("Question {} answered, correct: {}", session.current() + 1, verdict);
                println!("Ответ принят");

                match session.advance() {
                    Some(_) => render(&session),
                    None => return finish(ctx, dialogue, full_name, test_name, session),
                }
            }
        }
        "finish" => return finish(ctx, dialogue, full_name, test_name, session),
        _ => println!("Команды: open <номер>, next, answer ..., pick <номер>, list, finish"),
    }
    keep_session(dialogue, full_name, test_name, session)
}

fn keep_session(
    dialogue: &mut Dialogue,
    full_name: String,
    test_name: String,
    session: TestSession,
) -> HandlerResult {
    dialogue.update(State::StudentSession {
        full_name,
        test_name,
        session,
    });
    Ok(())
}

fn finish(
    ctx: &Context,
    dialogue: &mut Dialogue,
    full_name: String,
    test_name: String,
    session: TestSession,
) -> HandlerResult {
    let score = session.finalize();
    log::info!(
        "{} finished '{}' with {}% ({} of {})",
        full_name,
        test_name,
        score,
        session.correct_count(),
        session.len()
    );
    println!(
        "Тест «{}» завершён! Правильных ответов: {} из {}. Результат: {}%",
        test_name,
        session.correct_count(),
        session.len(),
        score
    );
    list_tests(ctx)?;
    dialogue.update(State::StudentChooseTest { full_name });
    Ok(())
}
