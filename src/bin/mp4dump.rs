use clap::{ArgAction, Parser};
use mp4atoms::{
    boxes::{select_by_path, Atom, AtomBody, Preamble},
    known_boxes::full_name,
    util::{hex_dump, read_slice},
    AtomFactory, FourCC,
};
use std::fs::File;
use std::io::BufReader;
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about = "MP4/ISOBMFF atom tree explorer")]
struct Args {
    /// MP4/ISOBMFF file path
    path: String,

    /// Only print subtree(s) matching a dotted path (e.g. moov.trak[0].mdia.minf.stbl)
    #[arg(long = "filter")]
    filter: Option<String>,

    /// Hex-dump the payload of every atom of this type (e.g. --raw esds)
    #[arg(long = "raw")]
    raw: Option<String>,

    /// Limit recursion depth of the tree output
    #[arg(long, default_value_t = 64)]
    max_depth: usize,

    /// Print parsed fields of leaf atoms and sample entries
    #[arg(long, action = ArgAction::SetTrue)]
    decode: bool,

    /// Bytes to dump with --raw (0 means the whole payload)
    #[arg(long, default_value_t = 0)]
    bytes: usize,

    /// Emit JSON instead of the human-readable tree
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,

    /// Do not register the metadata handler
    #[arg(long, action = ArgAction::SetTrue)]
    no_metadata: bool,
}

fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive("warn".parse()?)
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let args = Args::parse();
    let mut f = BufReader::new(File::open(&args.path)?);

    let factory = if args.no_metadata {
        AtomFactory::new()
    } else {
        AtomFactory::with_defaults()
    };
    let top = factory.parse_all(&mut f)?;
    info!(path = %args.path, atoms = top.len(), "parsed");

    let targets: Vec<&Atom> = match &args.filter {
        Some(path) => select_by_path(&top, path),
        None => top.iter().collect(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&targets)?);
        return Ok(());
    }

    for a in &targets {
        print_atom(a, 0, args.max_depth, args.decode)?;
    }

    if let Some(sel) = args.raw.as_ref() {
        let typ = FourCC::from_str(sel)
            .ok_or_else(|| anyhow::anyhow!("--raw expects a four-character type, got {sel:?}"))?;
        dump_raw(&mut f, &top, typ, args.bytes)?;
    }

    Ok(())
}

// ---------- Human-readable tree ----------

fn print_atom(a: &Atom, depth: usize, max_depth: usize, decode: bool) -> anyhow::Result<()> {
    let indent = "  ".repeat(depth);
    let hdr = &a.header;
    let name = full_name(hdr.typ).map(|n| format!(" [{n}]")).unwrap_or_default();
    let head = format!(
        "{indent}{:>8} {:>10} {}{}",
        format!("{:#x}", hdr.start),
        hdr.size,
        hdr.typ,
        name
    );

    match &a.body {
        AtomBody::Container(c) => {
            let full = c
                .full_header
                .map(|f| format!(" ver={} flags=0x{:06x}", f.version, f.flags))
                .unwrap_or_default();
            println!("{head} (container, {} children{full})", c.children.len());
            if decode && c.preamble != Preamble::None {
                println!("{indent}        -> {}", serde_json::to_string(&c.preamble)?);
            }
            if depth < max_depth {
                for child in &c.children {
                    print_atom(child, depth + 1, max_depth, decode)?;
                }
            }
        }
        AtomBody::Leaf(leaf) => {
            println!("{head}");
            if decode {
                println!("{indent}        -> {}", serde_json::to_string(leaf)?);
            }
        }
        AtomBody::Opaque(o) => {
            println!("{head} (opaque, {} bytes)", o.data_len);
        }
    }
    Ok(())
}

// ---------- Raw dump ----------

fn collect<'a>(atoms: &'a [Atom], typ: FourCC, out: &mut Vec<&'a Atom>) {
    for a in atoms {
        if a.typ() == typ {
            out.push(a);
        }
        collect(a.children(), typ, out);
    }
}

fn dump_raw(f: &mut BufReader<File>, atoms: &[Atom], typ: FourCC, limit: usize) -> anyhow::Result<()> {
    let mut matches = Vec::new();
    collect(atoms, typ, &mut matches);

    for (i, a) in matches.into_iter().enumerate() {
        let range = a.payload_range();
        let (off, len) = (range.start, range.end - range.start);
        let to_read = if limit == 0 { len } else { len.min(limit as u64) };
        let data = read_slice(f, off, to_read)?;
        println!(
            "\n== Dump {} ({}) payload: offset={:#x}, len={} ==",
            i,
            a.typ(),
            off,
            data.len()
        );
        print!("{}", hex_dump(&data, off));
    }
    Ok(())
}
