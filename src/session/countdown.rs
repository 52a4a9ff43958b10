/// Interview time limit, decremented once per second while the session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    total: u32,
    remaining: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownTick {
    Running { remaining: u32 },
    Expired,
}

impl Countdown {
    pub fn new(total_secs: u32) -> Self {
        Self {
            total: total_secs,
            remaining: total_secs,
        }
    }

    pub fn tick(&mut self) -> CountdownTick {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            CountdownTick::Expired
        } else {
            CountdownTick::Running {
                remaining: self.remaining,
            }
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn is_expired(&self) -> bool {
        self.remaining == 0
    }
}

/// `m:ss`
pub fn format_clock(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_on_last_tick() {
        let mut countdown = Countdown::new(3);
        assert_eq!(countdown.tick(), CountdownTick::Running { remaining: 2 });
        assert_eq!(countdown.tick(), CountdownTick::Running { remaining: 1 });
        assert_eq!(countdown.tick(), CountdownTick::Expired);
        assert!(countdown.is_expired());
        assert_eq!(countdown.tick(), CountdownTick::Expired);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(300), "5:00");
        assert_eq!(format_clock(59), "0:59");
        assert_eq!(format_clock(61), "1:01");
    }
}
