use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};

/// The I/O endpoints the syscall handlers talk to.
///
/// Production code wires this to stdin/stdout via [`Console::stdio`]; tests
/// substitute in-memory buffers and inspect them through
/// [`Console::into_inner`].
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl Console<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Console<BufReader<Stdin>, Stdout> {
        Console {
            input: BufReader::new(io::stdin()),
            output: io::stdout(),
        }
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Console<R, W> {
        Console { input, output }
    }

    /// Writes `text` to the output and flushes, so program output interleaves
    /// correctly with logging on the other stream.
    pub fn print(&mut self, text: &str) -> io::Result<()> {
        self.output.write_all(text.as_bytes())?;
        self.output.flush()
    }

    /// Reads one line from the input, without the trailing line break.
    pub fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }

    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }
}
