use crate::system::Weft;
use crate::throw::Throw;
use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::{Context, Editor};
use rustyline_derive::{Helper, Highlighter, Hinter, Validator};

#[derive(Helper, Highlighter, Hinter, Validator)]
struct WeftHelper {
    words: Vec<String>,
}

impl Completer for WeftHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> Result<(usize, Vec<String>), ReadlineError> {
        let start = line[..pos]
            .rfind(char::is_whitespace)
            .map(|at| at + 1)
            .unwrap_or(0);
        let prefix = line[start..pos].to_lowercase();
        if prefix.is_empty() {
            return Ok((start, Vec::new()));
        }
        let hits = self
            .words
            .iter()
            .filter(|w| w.to_lowercase().starts_with(&prefix))
            .cloned()
            .collect();
        Ok((start, hits))
    }
}

fn refresh_helper(rl: &mut Editor<WeftHelper>, w: &Weft) {
    rl.set_helper(Some(WeftHelper {
        words: w.word_names(),
    }));
}

pub fn console_repl(w: &mut Weft, load_history: bool) {
    let mut rl = Editor::<WeftHelper>::new();
    if load_history {
        let _ = rl.load_history("history.txt");
    }
    refresh_helper(&mut rl, w);
    let mut pending = false;
    loop {
        let prompt = if pending || w.compiling(0) { "... " } else { "> " };
        match rl.readline(prompt) {
            Ok(line) => {
                rl.add_history_entry(line.as_str());
                let r = if pending {
                    w.eval_continue(0, line.as_str())
                } else {
                    w.eval(line.as_str())
                };
                pending = false;
                match r {
                    Ok(()) => refresh_helper(&mut rl, w),
                    Err(t) if t == Throw::INCOMPLETE_INPUT => pending = true,
                    Err(t) if t == Throw::USER_EXIT => break,
                    Err(t) if t == Throw::QUIT => {}
                    Err(_) => {
                        if let Some(report) = w.last_error_report(0) {
                            eprint!("{}", report);
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }
    if load_history {
        if let Err(e) = rl.save_history("history.txt") {
            println!("history save failed: {:}", e);
        }
    }
}
