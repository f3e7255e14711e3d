use clap::{arg,crate_version,Command};
use packflate::deflate;

const RCH: &str = "unreachable was reached";

fn main() -> Result<(),Box<dyn std::error::Error>>
{
    env_logger::init();
    let long_help =
"Examples:
---------
Compress:      `packflate compress -m deflate -i my_expanded -o my_compressed`
Expand:        `packflate expand -m deflate -i my_compressed -o my_expanded`";

    let methods = ["deflate"];

    let mut main_cmd = Command::new("packflate")
        .about("Compress and expand with DEFLATE")
        .after_long_help(long_help)
        .version(crate_version!());
    main_cmd = main_cmd.subcommand(Command::new("compress")
        .arg(arg!(-m --method <METHOD> "compression algorithm").value_parser(methods)
            .required(true))
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .arg(arg!(-l --level <LEVEL> "compression level 0-9").value_parser(clap::value_parser!(usize))
            .required(false))
        .about("compress a file"));

        main_cmd = main_cmd.subcommand(Command::new("expand")
        .arg(arg!(-m --method <METHOD> "compression algorithm").required(true))
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .about("expand a file"));

    let matches = main_cmd.get_matches();

    if let Some(cmd) = matches.subcommand_matches("compress") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        let method = cmd.get_one::<String>("method").expect(RCH);
        let mut opt = deflate::STD_OPTIONS;
        if let Some(level) = cmd.get_one::<usize>("level") {
            opt.level = *level;
        }
        let mut in_file = std::fs::File::open(path_in)?;
        let mut out_file = std::fs::File::create(path_out)?;
        match method.as_str() {
            "deflate" => {
                let (in_size,out_size) = deflate::compress(&mut in_file,&mut out_file,&opt)?;
                eprintln!("compressed {} into {}",in_size,out_size);
            },
            _ => {
                eprintln!("{} not supported",method);
                return Err(Box::new(std::fmt::Error));
            }
        };
    }

    if let Some(cmd) = matches.subcommand_matches("expand") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        let method = cmd.get_one::<String>("method").expect(RCH);
        let mut in_file = std::fs::File::open(path_in)?;
        let mut out_file = std::fs::File::create(path_out)?;
        match method.as_str() {
            "deflate" => {
                let (in_size,out_size) = deflate::expand(&mut in_file,&mut out_file,&deflate::STD_OPTIONS)?;
                eprintln!("expanded {} into {}",in_size,out_size);
            },
            _ => {
                eprintln!("{} not supported",method);
                return Err(Box::new(std::fmt::Error));
            }
        };
    }

    Ok(())
}
