use weft::system::Weft;
use weft::throw::Throw;

use getopts::Options;

fn run_source(w: &mut Weft, src: &str) {
    match w.eval(src) {
        Ok(()) => {}
        Err(t) if t == Throw::USER_EXIT => std::process::exit(0),
        Err(_) => {
            if let Some(report) = w.last_error_report(0) {
                eprint!("{}", report);
            }
            std::process::exit(1);
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let mut opts = Options::new();
    opts.optopt("e", "", "evaluate expression", "EXPR");
    opts.optflag("q", "", "quit after running, skip the repl");
    opts.optflag("h", "help", "print this help");
    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    if matches.opt_present("h") {
        print!("{}", opts.usage("usage: weft [-e EXPR] [-q] [script]"));
        return;
    }

    let mut w = Weft::boot().unwrap();
    let mut ran = false;
    if let Some(expr) = matches.opt_str("e") {
        run_source(&mut w, &expr);
        ran = true;
    }
    if let Some(path) = matches.free.first() {
        match std::fs::read_to_string(path) {
            Ok(src) => run_source(&mut w, &src),
            Err(e) => {
                eprintln!("{}: {}", path, e);
                std::process::exit(1);
            }
        }
        ran = true;
    }

    if !(ran && matches.opt_present("q")) {
        weft::repl::console_repl(&mut w, true);
    }
}
