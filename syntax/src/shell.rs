//! Parsers for the shell code contained in task blocks.
//!
//! We don't interpret the code, we only need to find where it ends:
//! braces must balance, except inside quotes or after a backslash.

use crate::parse::prelude::*;
use crate::parse::util::braces;

p! {
    escaped_char() -> &'a str, {
        recognize(char('\\').and(any()))
    }
}

p! {
    single_quoted_string() -> &'a str, {
        recognize(
            char('\'').and(skip_many(none_of("'".chars()))).and(char('\''))
        )
    }
}

p! {
    double_quoted_string() -> &'a str, {
        recognize(
            char('"')
                .and(skip_many(
                    escaped_char().map(|_| ()).or(none_of("\"\\".chars()).map(|_| ()))
                ))
                .and(char('"'))
        )
    }
}

// any chunk of text with no quotes, escapes or braces in it.
p! {
    code_blob() -> &'a str, {
        recognize(skip_many1(none_of("{}'\"\\".chars())))
    }
}

p! {
    braces_section() -> &'a str, {
        recognize(braces(shell_block()))
    }
}

p! {
    shell_block() -> &'a str, {
        recognize(skip_many(choice!(
            code_blob(),
            escaped_char(),
            single_quoted_string(),
            double_quoted_string(),
            braces_section()
        )))
    }
}

p! {
    shell_code() -> &'a str, {
        shell_block().map(|text: &'a str| text.trim())
    }
}
