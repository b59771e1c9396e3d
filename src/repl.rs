//! Menu-driven command loop over any [`KvsEngine`].

use std::io::{self, BufRead, Write};
use std::ops::ControlFlow;

use tracing::{debug, warn};

use crate::{Error, ErrorKind, KvsEngine};

const MENU: &str = "
<-------------------- Key-Value Store -------------------->
Press 1 : Create Key-Value pair
Press 2 : Read Key-Value pair
Press 3 : Delete by Key
Press 4 : Exit";

/// Reads menu choices from `input` until it runs dry or the user exits. Results go to `out`,
/// failures to `err`. A failed operation is reported and the menu shown again; only I/O errors on
/// the terminal itself end the loop early.
pub struct Repl<'a, E, R, W1, W2> {
    engine: &'a E,
    input: R,
    out: W1,
    err: W2,
    line: String,
}

impl<'a, E, R, W1, W2> Repl<'a, E, R, W1, W2>
where
    E: KvsEngine,
    R: BufRead,
    W1: Write,
    W2: Write,
{
    pub fn new(engine: &'a E, input: R, out: W1, err: W2) -> Self {
        Self {
            engine,
            input,
            out,
            err,
            line: String::new(),
        }
    }

    pub fn run(mut self) -> io::Result<()> {
        loop {
            writeln!(self.out, "{MENU}")?;
            self.out.flush()?;

            let Some(choice) = self.read_line()? else {
                return Ok(());
            };
            let flow = match choice.trim() {
                "1" => self.create()?,
                "2" => self.read()?,
                "3" => self.delete()?,
                "4" => ControlFlow::Break(()),
                other => {
                    debug!(choice = other, "Unknown menu choice");
                    self.fail("Please give the correct option")?
                }
            };
            if flow.is_break() {
                return Ok(());
            }
        }
    }

    fn create(&mut self) -> io::Result<ControlFlow<()>> {
        let Some(key) = self.prompt("Give the key : ")? else {
            return Ok(ControlFlow::Break(()));
        };
        if key.is_empty() {
            return self.fail("Key cannot be empty");
        }
        if self.engine.contains_key(&key) {
            return self.fail(&describe_error(&Error::DuplicateKey(key)));
        }

        let Some(value) = self.prompt("Give the value : ")? else {
            return Ok(ControlFlow::Break(()));
        };
        if value.is_empty() {
            return self.fail("Value cannot be empty");
        }
        let Some(ttl) = self.prompt("Give the TTL in seconds [0 for the default] : ")? else {
            return Ok(ControlFlow::Break(()));
        };
        let Some(ttl_secs) = parse_ttl(&ttl) else {
            return self.fail("TTL must be a whole number of seconds");
        };

        match self.engine.put(&key, value.as_bytes(), ttl_secs) {
            Ok(()) => self.succeed("Key-Value pair has been added successfully"),
            Err(e) => self.fail(&describe_error(&e)),
        }
    }

    fn read(&mut self) -> io::Result<ControlFlow<()>> {
        let Some(key) = self.prompt("Give the key : ")? else {
            return Ok(ControlFlow::Break(()));
        };
        if key.is_empty() {
            return self.fail("Key cannot be empty");
        }
        match self.engine.get(&key) {
            Ok(value) => {
                let value = String::from_utf8_lossy(&value);
                self.succeed(&format!("\nKey : {key}, Value : {value}"))
            }
            Err(e) => self.fail(&describe_error(&e)),
        }
    }

    fn delete(&mut self) -> io::Result<ControlFlow<()>> {
        let Some(key) = self.prompt("Give the key : ")? else {
            return Ok(ControlFlow::Break(()));
        };
        if key.is_empty() {
            return self.fail("Key cannot be empty");
        }
        match self.engine.delete(&key) {
            Ok(()) => self.succeed("Key-Value pair has been deleted successfully"),
            Err(e) => self.fail(&describe_error(&e)),
        }
    }

    fn prompt(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.out, "{prompt}")?;
        self.out.flush()?;
        self.read_line()
    }

    /// Next line of input without its line ending, or `None` at end of input.
    fn read_line(&mut self) -> io::Result<Option<String>> {
        self.line.clear();
        if self.input.read_line(&mut self.line)? == 0 {
            return Ok(None);
        }
        Ok(Some(self.line.trim_end_matches(['\n', '\r']).to_owned()))
    }

    fn succeed(&mut self, message: &str) -> io::Result<ControlFlow<()>> {
        if message.starts_with('\n') {
            writeln!(self.out, "SUCCESS{message}")?;
        } else {
            writeln!(self.out, "SUCCESS: {message}")?;
        }
        Ok(ControlFlow::Continue(()))
    }

    fn fail(&mut self, message: &str) -> io::Result<ControlFlow<()>> {
        writeln!(self.err, "FAILED: {message}")?;
        self.err.flush()?;
        Ok(ControlFlow::Continue(()))
    }
}

/// Negative and zero TTLs both mean "use the default".
pub fn parse_ttl(ttl: &str) -> Option<u64> {
    let ttl: i64 = ttl.trim().parse().ok()?;
    Some(u64::try_from(ttl).unwrap_or(0))
}

/// A human-readable explanation of why an operation failed.
pub fn describe_error(e: &Error) -> String {
    match e.kind() {
        ErrorKind::Validation => e.to_string(),
        ErrorKind::DuplicateKey => {
            "Key already exists. Delete it first or choose another key".to_owned()
        }
        ErrorKind::NotFound => "Key does not exist".to_owned(),
        ErrorKind::Expired => "Key expired and it has been removed".to_owned(),
        ErrorKind::SizeLimit => format!("Store is full: {e}"),
        ErrorKind::Io => {
            warn!(?e, "Storage error");
            format!("Storage error: {e}")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::clock::ManualClock;
    use crate::{Base64Encoder, KvStore, Options};

    fn run(store: &KvStore<ManualClock>, input: &str) -> (String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        Repl::new(store, Cursor::new(input), &mut out, &mut err)
            .run()
            .unwrap();
        (
            String::from_utf8(out).unwrap(),
            String::from_utf8(err).unwrap(),
        )
    }

    fn open(dir: &tempfile::TempDir) -> (KvStore<ManualClock>, ManualClock) {
        let clock = ManualClock::new(0);
        let store =
            KvStore::open_with(Options::in_dir(dir.path()), clock.clone(), Base64Encoder).unwrap();
        (store, clock)
    }

    #[test]
    fn create_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = open(&dir);

        let (out, err) = run(&store, "1\nname\nFerris the crab\n0\n2\nname\n4\n");
        assert!(out.contains("SUCCESS: Key-Value pair has been added successfully"));
        assert!(out.contains("SUCCESS\nKey : name, Value : Ferris the crab"));
        assert_eq!(err, "");
    }

    #[test]
    fn failures_keep_the_loop_going() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = open(&dir);
        store.put("taken", "x", 0).unwrap();

        let (out, err) = run(&store, "9\n1\ntaken\n1\n\n1\nk\nv\nsoon\n3\nmissing\n2\ntaken\n");
        assert_eq!(
            err,
            "FAILED: Please give the correct option\n\
             FAILED: Key already exists. Delete it first or choose another key\n\
             FAILED: Key cannot be empty\n\
             FAILED: TTL must be a whole number of seconds\n\
             FAILED: Key does not exist\n"
        );
        assert!(out.contains("Key : taken, Value : x"));
        assert!(!store.contains_key("k"));
    }

    #[test]
    fn expired_key_is_reported_then_gone() {
        let dir = tempfile::tempdir().unwrap();
        let (store, clock) = open(&dir);
        store.put("k", "v", 1).unwrap();
        clock.advance(1_001);

        let (_, err) = run(&store, "2\nk\n2\nk\n");
        assert_eq!(
            err,
            "FAILED: Key expired and it has been removed\nFAILED: Key does not exist\n"
        );
    }

    #[test]
    fn delete_then_recreate() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = open(&dir);
        store.put("k", "old", 0).unwrap();

        let (out, err) = run(&store, "3\nk\n1\nk\nnew\n-3\n2\nk\n");
        assert_eq!(err, "");
        assert!(out.contains("SUCCESS: Key-Value pair has been deleted successfully"));
        assert!(out.contains("Key : k, Value : new"));
    }

    #[test]
    fn empty_input_is_rejected_at_its_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = open(&dir);

        // The empty value fails before the TTL is asked for, so "30" is read as a menu choice.
        let (out, err) = run(&store, "1\nk\n\n30\n2\n\n3\n\n");
        assert_eq!(
            err,
            "FAILED: Value cannot be empty\n\
             FAILED: Please give the correct option\n\
             FAILED: Key cannot be empty\n\
             FAILED: Key cannot be empty\n"
        );
        assert!(!out.contains("Give the TTL"));
        assert!(store.is_empty());
    }

    #[test]
    fn end_of_input_mid_command_exits() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = open(&dir);
        let (_, err) = run(&store, "1\nk\n");
        assert_eq!(err, "");
        assert!(store.is_empty());
    }

    #[test]
    fn ttl_parsing() {
        assert_eq!(parse_ttl(" 30 "), Some(30));
        assert_eq!(parse_ttl("0"), Some(0));
        assert_eq!(parse_ttl("-1"), Some(0));
        assert_eq!(parse_ttl("1.5"), None);
    }
}
