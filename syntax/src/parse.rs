use anyhow::Result;

#[derive(Debug, thiserror::Error)]
#[error("ParseError on line {line_num} '{line}': {msg}")]
pub struct Error {
    msg: String,
    pos: usize,
    line_num: usize,
    line: String,
}

/// Parse the full text of a task file into a list of items.
pub fn parse(text: &str) -> Result<Vec<crate::ast::Item<'_>>> {
    use combine::EasyParser;
    taskfile::items()
        .easy_parse(text)
        .map(|(items, _remainder)| items)
        .map_err(|e| {
            let pos = e.position.translate_position(text);
            // isolate the line in question:
            let before = &text[0..pos];
            let after = &text[pos..];
            let prefix = before.rsplit('\n').next().unwrap_or_default();
            let suffix = after.split('\n').next().unwrap_or_default();
            let line_num = before.matches('\n').count() + 1;
            // combine's errors borrow the input, so we stringify before returning.
            Error {
                pos,
                line_num,
                line: format!("{prefix}{suffix}"),
                msg: format!("{}", e),
            }
            .into()
        })
}

pub mod prelude {
    pub use combine::parser::char::{char, string};
    pub use combine::parser::range::recognize;
    pub use combine::*;
}

pub mod util {

    use super::prelude::*;
    use combine::parser::char::space;

    p! {
        name_char() -> char, {
            satisfy(|c: char| c.is_ascii_alphanumeric() || "_-:.".contains(c))
        }
    }

    // task and plan names, e.g. "build", "build:css", "lint-js":
    p! {
        name() -> &'a str, {
            recognize(skip_many1(name_char()))
        }
    }

    p! {
        comment() -> (), {
            char('#')
                .and(skip_many(none_of("\n".chars())))
                .map(|_| ())
        }
    }

    p! {
        whitespace() -> (), {
            skip_many1(
                space().map(|_| ()).or(comment())
            )
        }
    }

    wrapper! {
        lex(parser), {
            optional(whitespace()).with(parser).skip(optional(whitespace()))
        }
    }

    // keyword followed by *mandatory* whitespace; backtracks on a partial match.
    p! {
        keyword(word: &'static str) -> (), {
            attempt(string(*word).skip(whitespace())).map(|_| ())
        }
    }

    wrapper! {
        braces(parser), {
            char('{').with(parser).skip(char('}'))
        }
    }

    wrapper! {
        brackets(parser), {
            char('[').with(parser).skip(char(']'))
        }
    }

}

mod task {
    use super::prelude::*;
    use super::util::{braces, keyword, lex, name, whitespace};
    use crate::ast::TaskBlock;
    use crate::shell::shell_code;

    p! {
        dependencies() -> Vec<&'a str>, {
            lex(char('<')).with(many1(lex(name())))
        }
    }

    p! {
        task() -> TaskBlock<'a>, {
            keyword("task")
                .with(name())
                .and(optional(attempt(dependencies())))
                .skip(optional(whitespace()))
                .and(braces(shell_code()))
                .map(|((name, deps), code)| TaskBlock {
                    name,
                    deps: deps.unwrap_or_default(),
                    code,
                })
        }
    }

}

mod plan {
    use super::prelude::*;
    use super::util::{braces, brackets, keyword, lex, name, whitespace};
    use crate::ast::{Element, PlanBlock};

    p! {
        group() -> Vec<&'a str>, {
            brackets(
                optional(whitespace()).with(sep_by(lex(name()), char(',')))
            )
        }
    }

    p! {
        element() -> Element<'a>, {
            choice!(
                group().map(Element::Group),
                name().map(Element::Task)
            )
        }
    }

    p! {
        plan() -> PlanBlock<'a>, {
            keyword("plan")
                .with(name())
                .skip(optional(whitespace()))
                .and(braces(
                    optional(whitespace()).with(many(lex(element())))
                ))
                .map(|(name, elements)| PlanBlock { name, elements })
        }
    }

}

mod taskfile {
    use super::{plan::plan, prelude::*, task::task, util::lex, util::whitespace};
    use crate::ast::Item;

    p! {
        item() -> Item<'a>, {
            choice!(
                task().map(Item::Task),
                plan().map(Item::Plan)
            )
        }
    }

    p! {
        items() -> Vec<Item<'a>>, {
            optional(whitespace())
                .with(many(lex(item())))
                .skip(eof())
        }
    }
}
