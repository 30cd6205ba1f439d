/*!
 * Windows Command Line
 * Joins an argument vector into one string the MSVC runtime splits back
 */

#![cfg_attr(not(windows), allow(dead_code))]

use crate::core::errors::{LaunchStage, SubprocessError, SubprocessResult};

/// Characters that force an argument into quotes
const NEEDS_QUOTES: [char; 5] = [' ', '\t', '\n', '\x0b', '"'];

/// Build the command line for `args`
///
/// argv[0] is quoted verbatim; the runtime does not apply escape rules to
/// the program name, so it may not contain a quote.
pub(crate) fn join(program: &str, args: &[String]) -> SubprocessResult<String> {
    if let Some(nul) = args.iter().find(|a| a.contains('\0')) {
        return Err(SubprocessError::rejected(
            program,
            LaunchStage::Prepare,
            format!("argument {:?} contains a NUL byte", nul),
        ));
    }

    let Some((argv0, rest)) = args.split_first() else {
        return Err(SubprocessError::rejected(
            program,
            LaunchStage::Prepare,
            "empty argument list",
        ));
    };
    if argv0.contains('"') {
        return Err(SubprocessError::rejected(
            program,
            LaunchStage::Prepare,
            "program name contains a quote",
        ));
    }

    let mut line = String::with_capacity(args.iter().map(|a| a.len() + 3).sum());
    line.push('"');
    line.push_str(argv0);
    line.push('"');

    for arg in rest {
        line.push(' ');
        append_arg(&mut line, arg);
    }
    Ok(line)
}

fn append_arg(line: &mut String, arg: &str) {
    let quote = arg.is_empty() || arg.contains(NEEDS_QUOTES);
    if !quote {
        line.push_str(arg);
        return;
    }

    line.push('"');
    let mut backslashes = 0usize;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                // Escape the run before a quote, then the quote itself
                line.extend(std::iter::repeat('\\').take(backslashes * 2 + 1));
                backslashes = 0;
            }
            _ => {
                line.extend(std::iter::repeat('\\').take(backslashes));
                backslashes = 0;
            }
        }
        if c != '\\' {
            line.push(c);
        }
    }
    // A trailing run would escape the closing quote
    line.extend(std::iter::repeat('\\').take(backslashes * 2));
    line.push('"');
}
