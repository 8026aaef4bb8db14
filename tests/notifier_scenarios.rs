use db_notifier::driver::{DriverCall, RecordingDriver};
use db_notifier::logging::LogBuffer;
use db_notifier::message::{EnvironmentMessage, TestResultMessage, TestStatus};
use db_notifier::{
    load_config_from_str, DatabaseNotifier, DatabaseSchema, LogLevel, Message, MessageType,
    Notifier, NotifierError, NotifierLogger, NotifierState, Secret, Value,
};
use proptest::prelude::*;
use std::sync::Arc;

const RUNBOOK_SECTION: &str = r#"
logLevel = "INFO"
driver = "TestDriver"
server = "db.local"
database = "testdb"
username = "u"
password = "p"
tablename = "results"
"#;

fn build(driver: &RecordingDriver, config: DatabaseSchema) -> (DatabaseNotifier, LogBuffer) {
    let buffer = LogBuffer::new();
    let logger = NotifierLogger::fmt_writer(buffer.clone(), LogLevel::Trace);
    let notifier = DatabaseNotifier::new(config, Arc::new(driver.clone()), logger).unwrap();
    (notifier, buffer)
}

#[test]
fn end_to_end_test_result_flow() {
    let config = load_config_from_str(RUNBOOK_SECTION).unwrap();
    let driver = RecordingDriver::new();
    let (mut notifier, buffer) = build(&driver, config);

    notifier.initialize().unwrap();
    let connections = driver.connections();
    assert_eq!(connections.len(), 1);
    let raw = connections[0].to_odbc_string();
    assert!(raw.contains("DRIVER={TestDriver}"));
    assert!(raw.contains("SERVER=db.local"));
    assert!(raw.contains("DATABASE=testdb"));
    assert!(raw.contains("UID=u"));
    assert!(raw.contains("PWD=p"));
    assert!(!buffer.contents().contains("PWD=p"));
    buffer.clear();

    let message: Message = TestResultMessage::new("7", "case1", TestStatus::Passed).into();
    notifier.receive_message(&message).unwrap();

    let executed = driver.executed();
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].to_string(), "select * from results where ID=1");
    assert_eq!(executed[0].params(), &[Value::from("1")]);

    let lines = buffer.lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("INFO"));
    assert!(lines[0].contains("TestResultMessage"));

    notifier.finalize().unwrap();
    assert_eq!(notifier.state(), NotifierState::Finalized);
    assert_eq!(driver.close_count(), 1);
    assert_eq!(driver.calls().last(), Some(&DriverCall::Close));
}

#[test]
fn insert_row_is_parameterized_and_committed() {
    let config = load_config_from_str(RUNBOOK_SECTION).unwrap();
    let driver = RecordingDriver::new();
    let (mut notifier, _) = build(&driver, config);
    notifier.initialize().unwrap();

    notifier.insert_row("42").unwrap();

    let executed = driver.executed();
    assert_eq!(executed.len(), 1);
    assert!(executed[0].sql().contains("results"));
    assert!(!executed[0].sql().contains("42"));
    assert_eq!(executed[0].params(), &[Value::from("42")]);
    assert_eq!(driver.commit_count(), 1);
}

#[test]
fn update_table_never_executes() {
    let config = load_config_from_str(RUNBOOK_SECTION).unwrap();
    let driver = RecordingDriver::new();
    let (mut notifier, _) = build(&driver, config);
    notifier.initialize().unwrap();

    notifier.update_table("status = 'FAILED'");
    notifier.update_table("");

    assert!(driver.executed().is_empty());
    notifier.finalize().unwrap();
}

#[test]
fn lifecycle_violations_are_rejected() {
    let config = load_config_from_str(RUNBOOK_SECTION).unwrap();
    let driver = RecordingDriver::new();
    let (mut notifier, _) = build(&driver, config);
    let message: Message = TestResultMessage::new("1", "case1", TestStatus::Failed).into();

    assert!(notifier
        .receive_message(&message)
        .unwrap_err()
        .is_state_violation());
    assert!(notifier.finalize().unwrap_err().is_state_violation());

    notifier.initialize().unwrap();
    notifier.finalize().unwrap();

    assert!(notifier
        .receive_message(&message)
        .unwrap_err()
        .is_state_violation());
    assert!(notifier.finalize().unwrap_err().is_state_violation());
    assert!(matches!(
        notifier.initialize(),
        Err(NotifierError::AlreadyInitialized)
    ));
    assert_eq!(driver.connect_count(), 1);
    assert_eq!(driver.close_count(), 1);
}

#[test]
fn environment_messages_are_not_handled() {
    let config = load_config_from_str(RUNBOOK_SECTION).unwrap();
    let driver = RecordingDriver::new();
    let (mut notifier, _) = build(&driver, config);
    notifier.initialize().unwrap();

    let message: Message = EnvironmentMessage::new("lab-1", "deployed").into();
    assert!(matches!(
        notifier.receive_message(&message),
        Err(NotifierError::UnsubscribedMessage(MessageType::Environment))
    ));
    assert!(driver.executed().is_empty());
}

#[test]
fn unknown_log_level_fails_at_load() {
    let section = RUNBOOK_SECTION.replace("\"INFO\"", "\"VERBOSE\"");
    let err = load_config_from_str(&section).unwrap_err();
    assert!(err.to_string().contains("VERBOSE"));
}

#[cfg(feature = "sqlite")]
#[test]
fn sqlite_end_to_end() {
    use db_notifier::driver::SqliteDriver;
    use db_notifier::{ConnectionString, DatabaseDriver, Statement};

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.db");
    let config = DatabaseSchema {
        log_level: LogLevel::Info,
        driver: "SQLite3".to_string(),
        server: String::new(),
        database: path.to_string_lossy().into_owned(),
        username: String::new(),
        password: Secret::default(),
        table_name: "results".to_string(),
    };

    let mut setup = SqliteDriver::new()
        .connect(&ConnectionString::from_schema(&config))
        .unwrap();
    setup
        .execute(&Statement::new("create table results (ID text)"))
        .unwrap();
    setup.commit().unwrap();
    setup.close().unwrap();

    let buffer = LogBuffer::new();
    let mut notifier = DatabaseNotifier::new(
        config.clone(),
        Arc::new(SqliteDriver::new()),
        NotifierLogger::fmt_writer(buffer.clone(), LogLevel::Info),
    )
    .unwrap();
    notifier.initialize().unwrap();
    notifier.insert_row("1").unwrap();
    notifier.insert_row("42").unwrap();

    let rows: Vec<_> = notifier.select_by_column("ID", "42").unwrap().collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get(0), Some(&Value::from("42")));

    buffer.clear();
    notifier
        .receive_message(&TestResultMessage::new("1", "case1", TestStatus::Passed).into())
        .unwrap();
    assert_eq!(buffer.lines().len(), 1);
    notifier.finalize().unwrap();

    let mut check = SqliteDriver::new()
        .connect(&ConnectionString::from_schema(&config))
        .unwrap();
    let count = check
        .execute(&Statement::new("select * from results"))
        .unwrap()
        .count();
    assert_eq!(count, 2);
    check.close().unwrap();
}

fn level_strategy() -> impl Strategy<Value = LogLevel> {
    prop_oneof![
        Just(LogLevel::Trace),
        Just(LogLevel::Debug),
        Just(LogLevel::Info),
        Just(LogLevel::Warn),
        Just(LogLevel::Error),
    ]
}

prop_compose! {
    fn valid_config()(
        log_level in level_strategy(),
        driver in "[A-Za-z][A-Za-z0-9 ]{0,15}",
        server in "[a-z0-9.]{0,12}",
        database in "[a-z][a-z0-9]{0,10}",
        username in "[a-z]{0,8}",
        password in "[ -~]{0,12}",
        table_name in "[A-Za-z_][A-Za-z0-9_]{0,15}",
    ) -> DatabaseSchema {
        DatabaseSchema {
            log_level,
            driver,
            server,
            database,
            username,
            password: Secret::new(password),
            table_name,
        }
    }
}

proptest! {
    #[test]
    fn open_and_close_once_for_any_config(config in valid_config()) {
        let driver = RecordingDriver::new();
        let mut notifier =
            DatabaseNotifier::new(config, Arc::new(driver.clone()), NotifierLogger::disabled())
                .unwrap();

        prop_assert_eq!(notifier.subscribed_message_types().len(), 1);
        notifier.initialize().unwrap();
        notifier.finalize().unwrap();
        prop_assert_eq!(notifier.state(), NotifierState::Finalized);
        prop_assert_eq!(driver.connect_count(), 1);
        prop_assert_eq!(driver.close_count(), 1);
    }

    #[test]
    fn lookup_is_independent_of_content(
        config in valid_config(),
        name in "\\PC{0,40}",
        text in "\\PC{0,40}",
    ) {
        let driver = RecordingDriver::new();
        let buffer = LogBuffer::new();
        let table = config.table_name.clone();
        let level = config.log_level;
        let mut notifier = DatabaseNotifier::new(
            config,
            Arc::new(driver.clone()),
            NotifierLogger::fmt_writer(buffer.clone(), LogLevel::Trace),
        )
        .unwrap();
        notifier.initialize().unwrap();
        buffer.clear();

        let message: Message = TestResultMessage::new("x", name, TestStatus::Skipped)
            .with_message(text)
            .into();
        notifier.receive_message(&message).unwrap();

        let executed = driver.executed();
        prop_assert_eq!(executed.len(), 1);
        let expected = format!("select * from {} where ID=?", table);
        prop_assert_eq!(executed[0].sql(), expected.as_str());
        prop_assert_eq!(executed[0].params(), &[Value::from("1")][..]);

        let lines = buffer.lines();
        prop_assert_eq!(lines.len(), 1);
        prop_assert!(lines[0].contains(level.as_str()));
    }
}
