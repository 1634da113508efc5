//! FreeSat Huffman-compressed text.
//!
//! A dictionary is a context-dependent code: the tree used for the next
//! symbol depends on the previously decoded character. Dictionaries are
//! loaded from text with one `prev:bits:next` line per code, where `prev`
//! and `next` are a single character, `0xNN`, or one of `START`, `STOP` and
//! `ESCAPE`. Lines starting with `#` are comments.

use fxhash::FxHashMap;

use crate::config::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Symbol {
    Char(u8),
    Stop,
    Escape,
}

/// Context preceding the first character.
const START: u8 = 0x00;

#[derive(Debug, Clone, Default)]
struct Node {
    children: [Option<u32>; 2],
    symbol: Option<Symbol>,
}

/// A binary code tree stored as an arena.
#[derive(Debug, Clone)]
struct Tree(Vec<Node>);

impl Tree {
    fn new() -> Tree {
        Tree(vec![Node::default()])
    }

    fn insert(&mut self, bits: &[bool], symbol: Symbol) -> Result<(), &'static str> {
        let mut index = 0;
        for &bit in bits {
            if self.0[index].symbol.is_some() {
                return Err("code has a prefix that is already a code");
            }
            index = match self.0[index].children[bit as usize] {
                Some(child) => child as usize,
                None => {
                    self.0.push(Node::default());
                    let child = self.0.len() - 1;
                    self.0[index].children[bit as usize] = Some(child as u32);
                    child
                }
            };
        }
        let node = &mut self.0[index];
        if node.symbol.is_some() || node.children.iter().any(Option::is_some) {
            return Err("code is ambiguous");
        }
        node.symbol = Some(symbol);
        Ok(())
    }
}

/// Reads bits MSB first.
struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn next_bit(&mut self) -> Option<bool> {
        let byte = self.data.get(self.pos / 8)?;
        let bit = byte & (0x80 >> (self.pos % 8)) != 0;
        self.pos += 1;
        Some(bit)
    }

    fn next_byte(&mut self) -> Option<u8> {
        (0..8).try_fold(0u8, |acc, _| Some(acc << 1 | self.next_bit()? as u8))
    }
}

/// One FreeSat Huffman dictionary.
#[derive(Debug, Clone)]
pub struct HuffmanDictionary {
    trees: FxHashMap<u8, Tree>,
}

fn parse_symbol(s: &str) -> Option<Symbol> {
    match s {
        "START" => Some(Symbol::Char(START)),
        "STOP" => Some(Symbol::Stop),
        "ESCAPE" => Some(Symbol::Escape),
        _ => {
            if let Some(hex) = s.strip_prefix("0x") {
                return u8::from_str_radix(hex, 16).ok().map(Symbol::Char);
            }
            match *s.as_bytes() {
                [b] => Some(Symbol::Char(b)),
                _ => None,
            }
        }
    }
}

impl HuffmanDictionary {
    /// Parses a dictionary.
    pub fn parse(text: &str) -> Result<HuffmanDictionary, ConfigError> {
        let mut trees: FxHashMap<u8, Tree> = FxHashMap::default();
        for (i, line) in text.lines().enumerate() {
            let syntax = |reason| ConfigError::Syntax { line: i + 1, reason };

            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.splitn(3, ':');
            let (Some(prev), Some(bits), Some(next)) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(syntax("expected prev:bits:next"));
            };

            let Some(Symbol::Char(prev)) = parse_symbol(prev) else {
                return Err(syntax("invalid previous character"));
            };
            let Some(next) = parse_symbol(next) else {
                return Err(syntax("invalid next character"));
            };
            let bits = bits
                .bytes()
                .map(|b| match b {
                    b'0' => Ok(false),
                    b'1' => Ok(true),
                    _ => Err(syntax("invalid bit")),
                })
                .collect::<Result<Vec<_>, _>>()?;
            if bits.is_empty() {
                return Err(syntax("empty code"));
            }

            trees
                .entry(prev)
                .or_insert_with(Tree::new)
                .insert(&bits, next)
                .map_err(syntax)?;
        }

        if !trees.contains_key(&START) {
            return Err(ConfigError::Syntax {
                line: 0,
                reason: "no START codes",
            });
        }
        Ok(HuffmanDictionary { trees })
    }

    /// Decodes compressed text, excluding the `0x1F` selector and table byte.
    ///
    /// Decoding stops at `STOP` or when the data runs out. After `ESCAPE`,
    /// raw bytes follow up to and including the first ASCII byte; a raw zero
    /// byte acts as `STOP`. Returns `None` on a bit pattern with no code.
    pub fn decode(&self, data: &[u8]) -> Option<String> {
        let mut reader = BitReader { data, pos: 0 };
        let mut out = String::new();
        let mut prev = START;

        'symbols: loop {
            let Some(tree) = self.trees.get(&prev) else {
                log::debug!("HuffmanDictionary: no codes after 0x{:02X}", prev);
                return None;
            };

            let mut index = 0;
            let symbol = loop {
                if let Some(symbol) = tree.0[index].symbol {
                    break symbol;
                }
                let Some(bit) = reader.next_bit() else {
                    break 'symbols;
                };
                let Some(child) = tree.0[index].children[bit as usize] else {
                    log::debug!("HuffmanDictionary: invalid code after 0x{:02X}", prev);
                    return None;
                };
                index = child as usize;
            };

            match symbol {
                Symbol::Stop => break,
                Symbol::Char(c) => {
                    out.push(c as char);
                    prev = c;
                }
                Symbol::Escape => loop {
                    let Some(c) = reader.next_byte() else {
                        break 'symbols;
                    };
                    if c == 0 {
                        break 'symbols;
                    }
                    out.push(c as char);
                    if c < 0x80 {
                        prev = c;
                        break;
                    }
                },
            }
        }

        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    const DICT: &str = "\
# toy dictionary
START:0:a
START:10:b
START:11:ESCAPE
a:0:b
a:1:STOP
b:00:a
b:01:STOP
b:1:0x20
 :0:a
 :1:STOP
";

    #[test]
    fn test_decode() {
        let dict = HuffmanDictionary::parse(DICT).unwrap();
        // a b ' ' a STOP: 0 0 1 0 1 -> 0b00101000
        assert_eq!(dict.decode(&[0b0010_1000]).as_deref(), Some("ab a"));
        // b a STOP: 10 00 1
        assert_eq!(dict.decode(&[0b1000_1000]).as_deref(), Some("ba"));
        // ESCAPE 0xE9 'a' then a STOP
        assert_eq!(
            dict.decode(&[0b1111_1010, 0b0101_1000, 0b0110_0000]).as_deref(),
            Some("\u{e9}a"),
        );
        // data ends without STOP
        assert_eq!(dict.decode(&[]).as_deref(), Some(""));
    }

    #[test]
    fn test_parse_errors() {
        assert_matches!(
            HuffmanDictionary::parse("START:0:a\nSTART:01:b\n"),
            Err(ConfigError::Syntax { line: 2, .. })
        );
        assert_matches!(
            HuffmanDictionary::parse("START:0x:a\n"),
            Err(ConfigError::Syntax { line: 1, .. })
        );
        assert_matches!(
            HuffmanDictionary::parse("a:0:b\n"),
            Err(ConfigError::Syntax { line: 0, .. })
        );
        assert_matches!(
            HuffmanDictionary::parse("STOP:0:b\n"),
            Err(ConfigError::Syntax { line: 1, .. })
        );
    }
}
