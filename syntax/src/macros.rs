// Every parser in this crate runs over a `&str` range stream,
// so the stream bounds are spelled out once here.

/// Declare a parser fn returning `$ret`.
macro_rules! p (
    ($name:ident( $($arg: ident : $arg_type: ty),* ) -> $ret:ty, $code:expr) => (
        combine::parser!{
            pub fn $name['a, I]($($arg : $arg_type),*)(I) -> $ret
                where
                [I: combine::stream::RangeStream<Range = &'a str, Token = char>,
                 I::Error: combine::ParseError<
                     char,
                     &'a str,
                     <I as combine::stream::StreamOnce>::Position
                 >,
            ]            {
                $code
            }
        }
    );
);

/// Declare a parser fn that wraps another parser and returns its output.
macro_rules! wrapper {
    ($name:ident($delegate: ident), $code:expr) => (
        combine::parser!{
            pub fn $name['a, I, P]($delegate: P)(I) -> P::Output
                where
                [I: combine::stream::RangeStream<Range = &'a str, Token = char>,
                 I::Error: combine::ParseError<
                     char,
                     &'a str,
                     <I as combine::stream::StreamOnce>::Position
                 >,
                 P: combine::Parser<I>,
            ]            {
                $code
            }
        }
    );
}
