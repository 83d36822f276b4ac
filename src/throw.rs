use std::fmt;

/// Exception code carried by `throw`, `Cell`-convertible. Negative space is
/// reserved: -1..-58 for the standard codes, -256 and below for engine
/// control signals, the gap and positive codes for applications.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Throw(pub i64);

pub type Wres = Wres1<()>;
pub type Wres1<T> = Result<T, Throw>;
pub const OK: Wres = Ok(());

impl Throw {
    pub const ABORT: Throw = Throw(-1);
    pub const ABORT_QUOTE: Throw = Throw(-2);
    pub const STACK_OVERFLOW: Throw = Throw(-3);
    pub const STACK_UNDERFLOW: Throw = Throw(-4);
    pub const RETURN_STACK_OVERFLOW: Throw = Throw(-5);
    pub const RETURN_STACK_UNDERFLOW: Throw = Throw(-6);
    pub const DO_LOOPS_TOO_DEEP: Throw = Throw(-7);
    pub const DICTIONARY_OVERFLOW: Throw = Throw(-8);
    pub const INVALID_MEMORY_ADDRESS: Throw = Throw(-9);
    pub const DIVISION_BY_ZERO: Throw = Throw(-10);
    pub const RESULT_OUT_OF_RANGE: Throw = Throw(-11);
    pub const ARGUMENT_TYPE_MISMATCH: Throw = Throw(-12);
    pub const UNDEFINED_WORD: Throw = Throw(-13);
    pub const COMPILE_ONLY_WORD: Throw = Throw(-14);
    pub const INVALID_FORGET: Throw = Throw(-15);
    pub const ZERO_LENGTH_NAME: Throw = Throw(-16);
    pub const PICTURED_OUTPUT_OVERFLOW: Throw = Throw(-17);
    pub const PARSED_STRING_OVERFLOW: Throw = Throw(-18);
    pub const NAME_TOO_LONG: Throw = Throw(-19);
    pub const READ_ONLY_ADDRESS: Throw = Throw(-20);
    pub const UNSUPPORTED_OPERATION: Throw = Throw(-21);
    pub const CONTROL_STRUCTURE_MISMATCH: Throw = Throw(-22);
    pub const ADDRESS_ALIGNMENT: Throw = Throw(-23);
    pub const INVALID_NUMERIC_ARGUMENT: Throw = Throw(-24);
    pub const RETURN_STACK_IMBALANCE: Throw = Throw(-25);
    pub const LOOP_PARAMETERS_UNAVAILABLE: Throw = Throw(-26);
    pub const INVALID_RECURSION: Throw = Throw(-27);
    pub const USER_INTERRUPT: Throw = Throw(-28);
    pub const COMPILER_NESTING: Throw = Throw(-29);
    pub const OBSOLESCENT_FEATURE: Throw = Throw(-30);
    pub const NOT_CREATED: Throw = Throw(-31);
    pub const INVALID_NAME_ARGUMENT: Throw = Throw(-32);
    pub const INVALID_FILE_POSITION: Throw = Throw(-36);
    pub const FILE_IO_EXCEPTION: Throw = Throw(-37);
    pub const NONEXISTENT_FILE: Throw = Throw(-38);
    pub const UNEXPECTED_END_OF_FILE: Throw = Throw(-39);
    pub const FLOATING_OUT_OF_RANGE: Throw = Throw(-43);
    pub const FLOATING_STACK_OVERFLOW: Throw = Throw(-44);
    pub const FLOATING_STACK_UNDERFLOW: Throw = Throw(-45);
    pub const FLOATING_DIVIDE_BY_ZERO: Throw = Throw(-42);
    pub const COMPILATION_WORDLIST_DELETED: Throw = Throw(-48);
    pub const SEARCH_ORDER_OVERFLOW: Throw = Throw(-49);
    pub const SEARCH_ORDER_UNDERFLOW: Throw = Throw(-50);
    pub const COMPILATION_WORDLIST_CHANGED: Throw = Throw(-51);
    pub const CONTROL_FLOW_STACK_OVERFLOW: Throw = Throw(-52);
    pub const EXCEPTION_STACK_OVERFLOW: Throw = Throw(-53);
    pub const QUIT: Throw = Throw(-56);
    pub const CHAR_IO_EXCEPTION: Throw = Throw(-57);
    pub const BRACKET_IF_MISMATCH: Throw = Throw(-58);

    // Engine control signals: normal handbacks to the host, not faults.
    pub const OUT_OF_TEXT: Throw = Throw(-256);
    pub const RESTART: Throw = Throw(-257);
    pub const USER_EXIT: Throw = Throw(-258);
    pub const INCOMPLETE_INPUT: Throw = Throw(-259);

    /// Control-band codes pass through `catch` untouched.
    pub fn is_signal(self) -> bool {
        self.0 <= Self::OUT_OF_TEXT.0
    }

    pub fn description(self) -> Option<&'static str> {
        let s = match self {
            Throw::ABORT => "aborted",
            Throw::ABORT_QUOTE => "aborted",
            Throw::STACK_OVERFLOW => "stack overflow",
            Throw::STACK_UNDERFLOW => "stack underflow",
            Throw::RETURN_STACK_OVERFLOW => "return stack overflow",
            Throw::RETURN_STACK_UNDERFLOW => "return stack underflow",
            Throw::DO_LOOPS_TOO_DEEP => "do-loops nested too deeply",
            Throw::DICTIONARY_OVERFLOW => "dictionary overflow",
            Throw::INVALID_MEMORY_ADDRESS => "invalid memory address",
            Throw::DIVISION_BY_ZERO => "division by zero",
            Throw::RESULT_OUT_OF_RANGE => "result out of range",
            Throw::ARGUMENT_TYPE_MISMATCH => "argument type mismatch",
            Throw::UNDEFINED_WORD => "undefined word",
            Throw::COMPILE_ONLY_WORD => "interpreting a compile-only word",
            Throw::INVALID_FORGET => "invalid forget",
            Throw::ZERO_LENGTH_NAME => "attempt to use zero-length string as a name",
            Throw::PICTURED_OUTPUT_OVERFLOW => "pictured numeric output string overflow",
            Throw::PARSED_STRING_OVERFLOW => "parsed string overflow",
            Throw::NAME_TOO_LONG => "definition name too long",
            Throw::READ_ONLY_ADDRESS => "write to a read-only location",
            Throw::UNSUPPORTED_OPERATION => "unsupported operation",
            Throw::CONTROL_STRUCTURE_MISMATCH => "control structure mismatch",
            Throw::ADDRESS_ALIGNMENT => "address alignment exception",
            Throw::INVALID_NUMERIC_ARGUMENT => "invalid numeric argument",
            Throw::RETURN_STACK_IMBALANCE => "return stack imbalance",
            Throw::LOOP_PARAMETERS_UNAVAILABLE => "loop parameters unavailable",
            Throw::INVALID_RECURSION => "invalid recursion",
            Throw::USER_INTERRUPT => "user interrupt",
            Throw::COMPILER_NESTING => "compiler nesting",
            Throw::OBSOLESCENT_FEATURE => "obsolescent feature",
            Throw::NOT_CREATED => "word not defined by create",
            Throw::INVALID_NAME_ARGUMENT => "invalid name argument",
            Throw::UNEXPECTED_END_OF_FILE => "unexpected end of file",
            Throw::FLOATING_OUT_OF_RANGE => "floating-point result out of range",
            Throw::FLOATING_DIVIDE_BY_ZERO => "floating-point divide by zero",
            Throw::SEARCH_ORDER_OVERFLOW => "search-order overflow",
            Throw::SEARCH_ORDER_UNDERFLOW => "search-order underflow",
            Throw::COMPILATION_WORDLIST_CHANGED => "compilation word list changed",
            Throw::QUIT => "quit",
            Throw::OUT_OF_TEXT => "out of text",
            Throw::RESTART => "restart",
            Throw::USER_EXIT => "exit requested",
            Throw::INCOMPLETE_INPUT => "incomplete input",
            _ => return None,
        };
        Some(s)
    }
}

impl fmt::Debug for Throw {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.description() {
            Some(s) => write!(f, "throw {} ({})", self.0, s),
            None => write!(f, "throw {}", self.0),
        }
    }
}

impl fmt::Display for Throw {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.description() {
            Some(s) => f.write_str(s),
            None => write!(f, "exception #{}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptions() {
        assert_eq!(Some("undefined word"), Throw::UNDEFINED_WORD.description());
        assert_eq!(Some("stack underflow"), Throw(-4).description());
        assert_eq!(None, Throw(-100).description());
        assert_eq!("exception #77", format!("{}", Throw(77)));
    }

    #[test]
    fn test_signal_band() {
        assert!(Throw::OUT_OF_TEXT.is_signal());
        assert!(Throw::USER_EXIT.is_signal());
        assert!(!Throw::ABORT.is_signal());
        assert!(!Throw(-58).is_signal());
        assert!(!Throw(42).is_signal());
    }
}
