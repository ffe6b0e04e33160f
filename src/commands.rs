/// Session commands, autocomplete and argument parsing
use color_eyre::{eyre::eyre, Result};

use crate::listing::{SortDirection, ValueRange};

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub usage: &'static str,
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "more",
    aliases: &["m", "next"],
    usage: "more",
    description: "Load the next page",
  },
  Command {
    name: "rooms",
    aliases: &["r", "room"],
    usage: "rooms <n,...|any>",
    description: "Set the room counts in the draft filter",
  },
  Command {
    name: "price",
    aliases: &["p"],
    usage: "price <min> <max>",
    description: "Set the price range in the draft filter",
  },
  Command {
    name: "area",
    aliases: &["a"],
    usage: "area <min> <max>",
    description: "Set the area range in the draft filter",
  },
  Command {
    name: "apply",
    aliases: &["ok", "commit"],
    usage: "apply",
    description: "Apply the draft filter and reload",
  },
  Command {
    name: "reset",
    aliases: &["clear"],
    usage: "reset",
    description: "Clear all filters",
  },
  Command {
    name: "sort",
    aliases: &["s", "order"],
    usage: "sort <field|none> [asc|desc]",
    description: "Sort by name, plan, area, floor, totalFloors, price or rooms",
  },
  Command {
    name: "prefetch",
    aliases: &["pf"],
    usage: "prefetch <n,...>",
    description: "Fetch every listing with the given room counts",
  },
  Command {
    name: "show",
    aliases: &["ls", "list"],
    usage: "show",
    description: "Print the visible listings",
  },
  Command {
    name: "reload",
    aliases: &["rl", "refresh"],
    usage: "reload [hard]",
    description: "Reload from the first page; hard drops every cached query",
  },
  Command {
    name: "help",
    aliases: &["h", "?"],
    usage: "help",
    description: "List commands",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    usage: "quit",
    description: "Exit aptcat",
  },
];

/// A parsed session command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
  More,
  /// Empty means any room count
  Rooms(Vec<u32>),
  Price(ValueRange),
  Area(ValueRange),
  Apply,
  Reset,
  Sort(String, SortDirection),
  Prefetch(Vec<u32>),
  Show,
  Reload { hard: bool },
  Help,
  Quit,
}

/// Highest match tier a typed command may resolve through; below it are
/// the fuzzy tiers, offered only as suggestions.
const PREFIX_ALIAS: u32 = 3;

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  if input.is_empty() {
    return COMMANDS.iter().collect();
  }

  ranked(input).into_iter().map(|(cmd, _)| cmd).collect()
}

/// Resolve a typed command word by name, alias or prefix.
pub fn resolve(input: &str) -> Option<&'static Command> {
  ranked(input)
    .into_iter()
    .find(|(_, priority)| *priority <= PREFIX_ALIAS)
    .map(|(cmd, _)| cmd)
}

/// Matching commands with their tier, best first.
fn ranked(input: &str) -> Vec<(&'static Command, u32)> {
  let input_lower = input.to_lowercase();
  let mut matches: Vec<(&'static Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    // Exact match on name
    if cmd.name == input_lower {
      matches.push((cmd, 0)); // Highest priority
      continue;
    }

    // Exact match on alias
    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    // Prefix match on name
    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    // Prefix match on alias
    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
      continue;
    }

    // Fuzzy match (contains)
    if cmd.name.contains(&input_lower) {
      matches.push((cmd, 4));
      continue;
    }

    // Fuzzy match on alias
    if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
      matches.push((cmd, 5));
    }
  }

  // Sort by priority
  matches.sort_by_key(|(_, priority)| *priority);
  matches
}

/// Parse one input line. The first word is resolved by name, alias or
/// prefix; the rest are the command's arguments.
pub fn parse(line: &str) -> Result<SessionCommand> {
  let mut words = line.split_whitespace();
  let Some(word) = words.next() else {
    return Err(eyre!("Empty command"));
  };
  let args: Vec<&str> = words.collect();

  let cmd = resolve(word)
    .map(|cmd| cmd.name)
    .ok_or_else(|| eyre!("Unknown command: {} (try help)", word))?;

  let command = match cmd {
    "more" => SessionCommand::More,
    "rooms" => SessionCommand::Rooms(parse_rooms(&args, true)?),
    "price" => SessionCommand::Price(parse_range(&args)?),
    "area" => SessionCommand::Area(parse_range(&args)?),
    "apply" => SessionCommand::Apply,
    "reset" => SessionCommand::Reset,
    "sort" => parse_sort(&args)?,
    "prefetch" => {
      let rooms = parse_rooms(&args, false)?;
      if rooms.is_empty() {
        return Err(eyre!("Usage: prefetch <n,...>"));
      }
      SessionCommand::Prefetch(rooms)
    }
    "show" => SessionCommand::Show,
    "reload" => SessionCommand::Reload {
      hard: args.first().is_some_and(|a| a.eq_ignore_ascii_case("hard")),
    },
    "help" => SessionCommand::Help,
    "quit" => SessionCommand::Quit,
    other => return Err(eyre!("Unhandled command: {}", other)),
  };

  Ok(command)
}

/// Room counts as `1,2 3`; `any` clears the selection when allowed.
fn parse_rooms(args: &[&str], allow_any: bool) -> Result<Vec<u32>> {
  if allow_any && matches!(args, ["any"] | ["all"] | []) {
    return Ok(Vec::new());
  }

  args
    .iter()
    .flat_map(|arg| arg.split(','))
    .filter(|token| !token.is_empty())
    .map(|token| {
      token
        .parse::<u32>()
        .map_err(|e| eyre!("Invalid room count '{}': {}", token, e))
    })
    .collect()
}

fn parse_range(args: &[&str]) -> Result<ValueRange> {
  let [min, max] = args else {
    return Err(eyre!("Expected <min> <max>"));
  };
  let min: u64 = min
    .parse()
    .map_err(|e| eyre!("Invalid minimum '{}': {}", min, e))?;
  let max: u64 = max
    .parse()
    .map_err(|e| eyre!("Invalid maximum '{}': {}", max, e))?;

  ValueRange::checked(min, max).ok_or_else(|| eyre!("Minimum {} exceeds maximum {}", min, max))
}

fn parse_sort(args: &[&str]) -> Result<SessionCommand> {
  let (field, direction) = match args {
    [] | ["none"] => ("", SortDirection::Asc),
    [field] => (*field, SortDirection::Asc),
    [field, direction] => (*field, SortDirection::parse(direction)),
    _ => return Err(eyre!("Usage: sort <field|none> [asc|desc]")),
  };
  Ok(SessionCommand::Sort(field.to_string(), direction))
}
