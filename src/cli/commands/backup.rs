use isa_storage_json::Document;

use crate::cli::commands::CommandDefinition;
use crate::cli::context::{CommandError, CommandResult, ShellContext};
use crate::cli::io;
use crate::cli::output::{section, table};

const BACKUP_USAGE: &str =
    "backup [list [document]] | backup create [note] | backup restore <document> <name|number>";

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![CommandDefinition::new(
        "backup",
        "List, create or restore backups of the contribution files",
        BACKUP_USAGE,
        cmd_backup,
    )]
}

fn cmd_backup(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    match args {
        [] | ["list"] => list(context, &Document::ALL),
        ["list", document] => list(context, &[parse_document(document)?]),
        ["create", note @ ..] => {
            let note = (!note.is_empty()).then(|| note.join(" "));
            let mut created = 0;
            for document in Document::ALL {
                if let Some(info) = context.storage.backup_document(document, note.as_deref())? {
                    io::print_info(format!("  {}", info.id));
                    created += 1;
                }
            }
            if created == 0 {
                io::print_info("Nothing to back up yet.");
            } else {
                io::print_success(format!("{} backup(s) written.", created));
            }
            Ok(())
        }
        ["restore", document, reference] => {
            let document = parse_document(document)?;
            let backups = context.storage.list_backups(document)?;
            let chosen = match reference.parse::<usize>() {
                Ok(position) if position >= 1 && position <= backups.len() => {
                    backups.get(position - 1)
                }
                _ => backups.iter().find(|info| info.id == *reference),
            }
            .ok_or_else(|| {
                CommandError::InvalidArguments(format!(
                    "no {} backup matches `{}`",
                    document, reference
                ))
            })?;
            context.storage.restore_backup(document, chosen)?;
            io::print_success(format!("{} restored from `{}`.", document, chosen.id));
            Ok(())
        }
        _ => Err(CommandError::usage(BACKUP_USAGE)),
    }
}

fn list(context: &ShellContext, documents: &[Document]) -> CommandResult {
    section("Backups");
    let mut rows = Vec::new();
    for document in documents {
        for (idx, info) in context.storage.list_backups(*document)?.iter().enumerate() {
            rows.push(vec![
                document.to_string(),
                (idx + 1).to_string(),
                info.created_at.clone(),
                info.id.clone(),
            ]);
        }
    }
    if rows.is_empty() {
        io::print_info("No backups yet. They are written whenever a file changes.");
    } else {
        table(&["Document", "#", "Created", "File"], &rows);
    }
    Ok(())
}

fn parse_document(value: &str) -> Result<Document, CommandError> {
    Ok(value.parse::<Document>()?)
}
