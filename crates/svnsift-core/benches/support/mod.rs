#![allow(dead_code)]

#[derive(Clone, Copy, Debug)]
pub struct BenchmarkTier {
    pub name: &'static str,
    pub projects: usize,
    pub revisions: usize,
}

pub const TIER_S: BenchmarkTier = BenchmarkTier {
    name: "S",
    projects: 8,
    revisions: 500,
};

pub const TIER_M: BenchmarkTier = BenchmarkTier {
    name: "M",
    projects: 32,
    revisions: 5_000,
};

pub const TIERS: [BenchmarkTier; 2] = [TIER_S, TIER_M];

#[derive(Debug)]
pub struct SyntheticDump {
    pub tier: BenchmarkTier,
    pub bytes: Vec<u8>,
    pub nodes: usize,
}

#[derive(Clone, Copy, Debug)]
struct Prng(u64);

impl Prng {
    fn next_u64(&mut self) -> u64 {
        // 64-bit LCG constants from Numerical Recipes.
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0
    }

    fn next_index(&mut self, upper_exclusive: usize) -> usize {
        (self.next_u64() as usize) % upper_exclusive
    }

    fn chance(&mut self, numerator: u64, denominator: u64) -> bool {
        self.next_u64() % denominator < numerator
    }
}

fn revision(out: &mut String, number: usize) {
    out.push_str(&format!(
        "Revision-number: {number}\nProp-content-length: 10\nContent-length: 10\n\nPROPS-END\n\n"
    ));
}

fn dir(out: &mut String, path: &str) {
    out.push_str(&format!("Node-path: {path}\nNode-kind: dir\nNode-action: add\n\n\n"));
}

fn file(out: &mut String, path: &str, action: &str, text: &str) {
    out.push_str(&format!(
        "Node-path: {path}\nNode-kind: file\nNode-action: {action}\n\
         Text-content-length: {len}\nContent-length: {len}\n\n{text}\n\n",
        len = text.len()
    ));
}

fn copy(out: &mut String, path: &str, from_rev: usize, from_path: &str) {
    out.push_str(&format!(
        "Node-path: {path}\nNode-kind: dir\nNode-action: add\n\
         Node-copyfrom-rev: {from_rev}\nNode-copyfrom-path: {from_path}\n\n\n"
    ));
}

/// Dump with one project directory per tier project, files added and
/// changed at random, and an occasional branch copied from a project.
pub fn generate_dump(tier: BenchmarkTier, seed: u64) -> SyntheticDump {
    let mut rng = Prng(seed);
    let mut out = String::from("SVN-fs-dump-format-version: 2\n\n");
    let mut files: Vec<Vec<String>> = vec![Vec::new(); tier.projects];
    let mut nodes = 0;

    revision(&mut out, 0);
    revision(&mut out, 1);
    dir(&mut out, "projects");
    dir(&mut out, "branches");
    nodes += 2;
    for project in 0..tier.projects {
        dir(&mut out, &format!("projects/p{project}"));
        nodes += 1;
    }

    for number in 2..tier.revisions {
        revision(&mut out, number);
        let project = rng.next_index(tier.projects);
        let text = format!("revision {number} of p{project}");
        if files[project].is_empty() || rng.chance(1, 3) {
            let path = format!("projects/p{project}/f{number}.txt");
            file(&mut out, &path, "add", &text);
            files[project].push(path);
        } else {
            let path = &files[project][rng.next_index(files[project].len())];
            file(&mut out, path, "change", &text);
        }
        nodes += 1;
        if rng.chance(1, 20) {
            let branch = format!("branches/p{project}-r{number}");
            copy(&mut out, &branch, number - 1, &format!("projects/p{project}"));
            nodes += 1;
        }
    }

    SyntheticDump {
        tier,
        bytes: out.into_bytes(),
        nodes,
    }
}
